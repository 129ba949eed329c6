// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build registry - SQLite log of builds and tracked repositories
//!
//! The registry is the single source of truth for what was built, from
//! which commit, with which flags, and where it was installed. At most one
//! build per software is marked active.

use crate::error::{Error, Result};
use crate::types::{BuildRecord, RepositoryRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const BUILD_COLUMNS: &str =
    "Id, Software, GitHash, BuildDateTime, Configuration, InstallPath, IsActive";

const REPOSITORY_COLUMNS: &str =
    "Id, Software, RepoUrl, LocalPath, LastUpdated, Branch, CurrentHash";

/// Handle on the registry database
pub struct Registry {
    conn: Connection,
}

impl Registry {
    /// Open (creating if needed) the registry at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        debug!("Opening registry {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a throwaway in-memory registry
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(30))?;
        let registry = Self { conn };
        registry.ensure_schema()?;
        Ok(registry)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS Repositories (
                Id          INTEGER PRIMARY KEY AUTOINCREMENT,
                Software    TEXT NOT NULL UNIQUE,
                RepoUrl     TEXT NOT NULL,
                LocalPath   TEXT NOT NULL,
                LastUpdated TEXT NOT NULL,
                Branch      TEXT NOT NULL,
                CurrentHash TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS Builds (
                Id            INTEGER PRIMARY KEY AUTOINCREMENT,
                Software      TEXT NOT NULL,
                GitHash       TEXT NOT NULL,
                BuildDateTime TEXT NOT NULL,
                Configuration TEXT NOT NULL,
                InstallPath   TEXT NOT NULL,
                IsActive      INTEGER NOT NULL DEFAULT 0
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_builds_natural_key
                ON Builds(Software, GitHash, Configuration);
            CREATE INDEX IF NOT EXISTS idx_builds_software ON Builds(Software);",
        )?;
        Ok(())
    }

    // =========================================================================
    // Builds
    // =========================================================================

    /// Record a build, returning its id
    ///
    /// A build with the same software, commit and configuration updates the
    /// existing row's timestamp and install path instead of adding a row.
    pub fn register(
        &self,
        software: &str,
        commit: &str,
        configuration: &str,
        install_path: &Path,
    ) -> Result<i64> {
        let now = timestamp(Utc::now());
        let install = install_path.to_string_lossy();

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT Id FROM Builds WHERE Software = ?1 AND GitHash = ?2 AND Configuration = ?3",
                params![software, commit, configuration],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE Builds SET BuildDateTime = ?1, InstallPath = ?2 WHERE Id = ?3",
                params![now, install, id],
            )?;
            debug!("Updated build {} of {} at {}", id, software, commit);
            return Ok(id);
        }

        self.conn.execute(
            "INSERT INTO Builds (Software, GitHash, BuildDateTime, Configuration, InstallPath, IsActive)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![software, commit, now, configuration, install],
        )?;
        let id = self.conn.last_insert_rowid();
        info!("Registered build {} of {} at {}", id, software, commit);
        Ok(id)
    }

    /// Mark the build of `software` at `commit` active
    ///
    /// Every build of `software` is deactivated first, even when no build
    /// at `commit` exists; in that case `false` is returned and the software
    /// is left with no active build. When several configurations were built
    /// from the commit, the most recently built one is activated.
    pub fn set_active(&self, software: &str, commit: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE Builds SET IsActive = 0 WHERE Software = ?1",
            params![software],
        )?;
        let updated = tx.execute(
            "UPDATE Builds SET IsActive = 1 WHERE Id = (
                SELECT Id FROM Builds WHERE Software = ?1 AND GitHash = ?2
                ORDER BY BuildDateTime DESC, Id DESC LIMIT 1
            )",
            params![software, commit],
        )?;

        tx.commit()?;

        if updated == 0 {
            warn!("No build of {} at {}; {} has no active build now", software, commit, software);
        }
        Ok(updated == 1)
    }

    /// The active build of `software`, if any
    pub fn get_active(&self, software: &str) -> Result<Option<BuildRecord>> {
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM Builds WHERE Software = ?1 AND IsActive = 1 LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![software], build_from_row)
            .optional()?)
    }

    /// Active builds of every software, by software name
    pub fn active_builds(&self) -> Result<Vec<BuildRecord>> {
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM Builds WHERE IsActive = 1 ORDER BY Software ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], build_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent build of `software` at `commit`
    pub fn find_build(&self, software: &str, commit: &str) -> Result<Option<BuildRecord>> {
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM Builds WHERE Software = ?1 AND GitHash = ?2
             ORDER BY BuildDateTime DESC, Id DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![software, commit], build_from_row)
            .optional()?)
    }

    /// Build by row id
    pub fn get_build(&self, id: i64) -> Result<Option<BuildRecord>> {
        let sql = format!("SELECT {BUILD_COLUMNS} FROM Builds WHERE Id = ?1");
        Ok(self.conn.query_row(&sql, params![id], build_from_row).optional()?)
    }

    /// Build history, newest first
    ///
    /// Without a software filter the rows are grouped by software name.
    pub fn history(&self, software: Option<&str>) -> Result<Vec<BuildRecord>> {
        let records = match software {
            Some(name) => {
                let sql = format!(
                    "SELECT {BUILD_COLUMNS} FROM Builds WHERE Software = ?1
                     ORDER BY BuildDateTime DESC, Id DESC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![name], build_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!(
                    "SELECT {BUILD_COLUMNS} FROM Builds
                     ORDER BY Software ASC, BuildDateTime DESC, Id DESC"
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], build_from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Insert or refresh the tracking row of a checkout, returning its id
    pub fn upsert_repository(&self, record: &RepositoryRecord) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO Repositories (Software, RepoUrl, LocalPath, LastUpdated, Branch, CurrentHash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(Software) DO UPDATE SET
                RepoUrl = excluded.RepoUrl,
                LocalPath = excluded.LocalPath,
                LastUpdated = excluded.LastUpdated,
                Branch = excluded.Branch,
                CurrentHash = excluded.CurrentHash",
            params![
                record.software,
                record.repo_url,
                record.local_path.to_string_lossy(),
                timestamp(record.last_updated),
                record.branch,
                record.current_hash,
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT Id FROM Repositories WHERE Software = ?1",
            params![record.software],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Tracking row of `software`
    pub fn get_repository(&self, software: &str) -> Result<Option<RepositoryRecord>> {
        let sql = format!("SELECT {REPOSITORY_COLUMNS} FROM Repositories WHERE Software = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![software], repository_from_row)
            .optional()?)
    }

    /// All tracked repositories by software name
    pub fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let sql = format!("SELECT {REPOSITORY_COLUMNS} FROM Repositories ORDER BY Software ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], repository_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Stop tracking `software`; builds are kept
    pub fn remove_repository(&self, software: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM Repositories WHERE Software = ?1",
            params![software],
        )?;
        Ok(removed > 0)
    }
}

/// Fixed-width UTC text so that timestamps sort lexically
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn build_from_row(row: &Row<'_>) -> rusqlite::Result<BuildRecord> {
    Ok(BuildRecord {
        id: row.get(0)?,
        software: row.get(1)?,
        commit: row.get(2)?,
        built_at: parse_timestamp(row, 3)?,
        configuration: row.get(4)?,
        install_path: PathBuf::from(row.get::<_, String>(5)?),
        is_active: row.get(6)?,
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRecord> {
    Ok(RepositoryRecord {
        id: row.get(0)?,
        software: row.get(1)?,
        repo_url: row.get(2)?,
        local_path: PathBuf::from(row.get::<_, String>(3)?),
        last_updated: parse_timestamp(row, 4)?,
        branch: row.get(5)?,
        current_hash: row.get(6)?,
    })
}
