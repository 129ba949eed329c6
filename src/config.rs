// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management and the on-disk layout of the build yard
//!
//! The configuration is resolved once in `main` (defaults, then an optional
//! TOML file, then `BUILDYARD_*` environment variables, then CLI flags) and
//! handed to every component by reference.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-software symlink that points at the active build
pub const CURRENT_LINK: &str = "current";

/// Name of the checkout directory under a software root
pub const SOURCE_DIR: &str = "src";

/// Directory names under the root that cannot be used as software names
pub const RESERVED_NAMES: &[&str] = &["bin", "templates"];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of the yard: bin/, templates/ and one directory per software
    pub root: PathBuf,
    /// Registry database file (defaults to `<root>/buildyard.db`)
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Branch used when a template does not name one
    pub default_branch: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: project_dirs()
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| {
                    std::env::current_dir()
                        .unwrap_or_else(|_| PathBuf::from("."))
                        .join(".buildyard")
                }),
            database: None,
            default_branch: "main".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Configuration rooted at `root` with every other field defaulted
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Shared directory holding one symlink per discovered executable
    #[must_use]
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Directory holding `<name>.json` template documents
    #[must_use]
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    /// Registry database path
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| self.root.join("buildyard.db"))
    }

    /// `<root>/<software>`
    #[must_use]
    pub fn software_root(&self, software: &str) -> PathBuf {
        self.root.join(software)
    }

    /// `<root>/<software>/<commit>`, the install tree of one build
    #[must_use]
    pub fn install_dir(&self, software: &str, commit: &str) -> PathBuf {
        self.software_root(software).join(commit)
    }

    /// `<root>/<software>/current`
    #[must_use]
    pub fn current_link(&self, software: &str) -> PathBuf {
        self.software_root(software).join(CURRENT_LINK)
    }

    /// `<root>/<software>/src`, the source checkout
    #[must_use]
    pub fn source_dir(&self, software: &str) -> PathBuf {
        self.software_root(software).join(SOURCE_DIR)
    }

    /// Create the root, bin and templates directories
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [self.root.clone(), self.bin_dir(), self.templates_dir()] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Reject names that cannot safely become a directory under the root
pub fn validate_software_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if name.is_empty() || !valid_chars || name.starts_with('.') || RESERVED_NAMES.contains(&name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "hyperpolymath", "buildyard")
}

/// Platform default location of the configuration file
#[must_use]
pub fn default_config_file() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
}

/// Load configuration from defaults, an optional file and the environment
///
/// An explicitly given `path` must exist; the platform default file is
/// optional.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let mut builder = config::Config::builder()
        .set_default("root", defaults.root.to_string_lossy().into_owned())?
        .set_default("default_branch", defaults.default_branch)?
        .set_default("log_level", defaults.log_level)?;

    let required = path.is_some();
    if let Some(file) = path.map(Path::to_path_buf).or_else(default_config_file) {
        tracing::debug!("Reading configuration from {}", file.display());
        builder = builder.add_source(
            config::File::from(file.as_path())
                .format(config::FileFormat::Toml)
                .required(required),
        );
    }

    let cfg = builder
        .add_source(config::Environment::with_prefix("BUILDYARD"))
        .build()?
        .try_deserialize::<Config>()?;

    Ok(cfg)
}
