// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Buildyard library - clone, build, register and switch toolchain builds
//!
//! This crate keeps source checkouts of large projects (LLVM, .NET tools)
//! up to date, drives their native build systems from JSON templates,
//! records every build in a SQLite registry and exposes the active build
//! of each software through symlinks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod process;
pub mod registry;
pub mod repo;
pub mod routines;
pub mod switch;
pub mod templates;

pub use error::{Error, Result};

/// Core data types shared by the registry, templates and driver
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Flag values handed to a build routine, keyed by flag name
    pub type Configuration = BTreeMap<String, String>;

    /// Key injected into every build configuration with the install tree path
    pub const INSTALL_DIRECTORY_KEY: &str = "InstallDirectory";

    /// Render a template configuration value as a flag string
    ///
    /// Booleans follow the cmake `ON`/`OFF` convention and arrays become
    /// cmake lists.
    #[must_use]
    pub fn render_value(value: &serde_json::Value) -> String {
        use serde_json::Value;

        match value {
            Value::Null => String::new(),
            Value::Bool(true) => "ON".to_string(),
            Value::Bool(false) => "OFF".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(";"),
            Value::Object(_) => value.to_string(),
        }
    }

    /// Flatten a configuration into the `key=value, ...` registry summary
    ///
    /// The injected install directory is left out so that rebuilding the
    /// same flags maps onto the same registry row. Backslashes, `,` and `=` in
    /// keys and values are backslash-escaped, so distinct configurations
    /// never share a summary.
    #[must_use]
    pub fn summarize(config: &Configuration) -> String {
        config
            .iter()
            .filter(|(k, _)| k.as_str() != INSTALL_DIRECTORY_KEY)
            .map(|(k, v)| format!("{}={}", escape_summary(k), escape_summary(v)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn escape_summary(text: &str) -> std::borrow::Cow<'_, str> {
        if !text.contains(['\\', ',', '=']) {
            return std::borrow::Cow::Borrowed(text);
        }
        let mut escaped = String::with_capacity(text.len() + 4);
        for c in text.chars() {
            if matches!(c, '\\' | ',' | '=') {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        std::borrow::Cow::Owned(escaped)
    }

    // =========================================================================
    // Template
    // =========================================================================

    /// How to fetch and build one software package
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Template {
        /// Software name; also the template file stem and directory name
        pub name: String,
        /// Human description
        #[serde(default)]
        pub description: String,
        /// Remote URL to clone
        pub repository: String,
        /// Branch to track (configured default branch when absent)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub branch: Option<String>,
        /// Build entry point relative to the checkout
        pub build_script: String,
        /// Identifier of the build routine to run
        pub build_function: String,
        /// Default flag values
        #[serde(default)]
        pub default_configuration: BTreeMap<String, serde_json::Value>,
        /// Advisory description of accepted flags; never enforced
        #[serde(default)]
        pub configuration_schema: serde_json::Value,
        /// File name globs identifying produced executables
        #[serde(default)]
        pub executable_patterns: Vec<String>,
    }

    impl Template {
        /// Default configuration rendered to flag strings
        #[must_use]
        pub fn defaults(&self) -> Configuration {
            self.default_configuration
                .iter()
                .map(|(k, v)| (k.clone(), render_value(v)))
                .collect()
        }
    }

    // =========================================================================
    // Registry Records
    // =========================================================================

    /// One registered build of a software at a commit with a configuration
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BuildRecord {
        /// Auto-increment row id
        pub id: i64,
        /// Software name
        pub software: String,
        /// Commit hash the build was made from
        pub commit: String,
        /// When the build was (last) registered
        pub built_at: DateTime<Utc>,
        /// Flattened configuration summary
        pub configuration: String,
        /// Install tree of this build
        pub install_path: PathBuf,
        /// Whether this is the active build of its software
        pub is_active: bool,
    }

    /// A tracked source checkout
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RepositoryRecord {
        /// Row id (0 before insertion)
        pub id: i64,
        /// Software name
        pub software: String,
        /// Remote URL
        pub repo_url: String,
        /// Checkout directory
        pub local_path: PathBuf,
        /// Last refresh time
        pub last_updated: DateTime<Utc>,
        /// Tracked branch
        pub branch: String,
        /// HEAD after the last refresh
        pub current_hash: String,
    }
}
