// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Library error type

use std::path::PathBuf;

/// Errors raised by the build yard library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No template file exists for the requested software
    #[error("no template found for '{0}'")]
    TemplateNotFound(String),

    /// A template document is structurally unusable
    #[error("invalid template '{name}': {reason}")]
    InvalidTemplate {
        /// Template name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// The template names a build routine nobody registered
    #[error("build routine '{routine}' for '{software}' is not registered")]
    RoutineNotFound {
        /// Software the template describes
        software: String,
        /// Routine identifier from the template
        routine: String,
    },

    /// No registry row for the software/commit pair
    #[error("no build of '{software}' at {commit} is registered")]
    BuildNotFound {
        /// Software name
        software: String,
        /// Commit hash
        commit: String,
    },

    /// The registry refused to mark a build active
    #[error("could not activate '{software}' at {commit}; it now has no active build")]
    ActivationFailed {
        /// Software name
        software: String,
        /// Commit hash
        commit: String,
    },

    /// Software names double as directory names
    #[error("invalid software name '{0}'")]
    InvalidName(String),

    /// An external tool ran and exited unsuccessfully
    #[error("{program} failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        /// Program that was run
        program: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// An external tool could not be started at all
    #[error("could not run {program}: {source}")]
    ToolUnavailable {
        /// Program that was run
        program: String,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// Another build of the same software holds the marker file
    #[error("a build is already in progress (marker {})", .0.display())]
    BuildInProgress(PathBuf),

    /// Reading repository state failed
    #[error("git: {0}")]
    Git(String),

    /// Filesystem operation failed
    #[error("{}: {source}", path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Registry storage error
    #[error("registry: {0}")]
    Database(#[from] rusqlite::Error),

    /// Template (de)serialization error
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Executable pattern did not compile
    #[error("glob: {0}")]
    Glob(#[from] globset::Error),
}

impl Error {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for library operations
pub type Result<T, E = Error> = std::result::Result<T, E>;
