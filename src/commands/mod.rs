// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod active;
pub mod build;
pub mod completions;
pub mod config;
pub mod history;
pub mod repo;
pub mod template;

use crate::config::Config;
use crate::registry::Registry;
use crate::templates::TemplateStore;
use anyhow::{Context as _, Result};
use serde::Serialize;

/// State shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Resolved configuration
    pub config: Config,
    /// Emit JSON instead of text
    pub json: bool,
}

impl Context {
    /// Open the registry named by the configuration
    pub fn registry(&self) -> Result<Registry> {
        let path = self.config.database_path();
        Registry::open(&path)
            .with_context(|| format!("Failed to open registry {}", path.display()))
    }

    /// Template store under the configured root
    #[must_use]
    pub fn templates(&self) -> TemplateStore {
        TemplateStore::new(self.config.templates_dir())
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

/// First 12 characters of a commit hash
#[must_use]
pub fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
