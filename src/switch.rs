// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Active-build switch - turns a registry activation into symlinks
//!
//! Activating a build points `<root>/<software>/current` at its install
//! tree and links every matching executable into the shared `bin/`
//! directory. Existing `bin/` entries are never replaced: a name already
//! claimed by another software or an older build keeps its target until
//! someone removes it by hand.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::templates::{TemplateStore, DEFAULT_EXECUTABLE_PATTERNS};
use crate::types::BuildRecord;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// What an activation did to the filesystem
#[derive(Debug, Clone, Serialize)]
pub struct ActivationReport {
    /// The build now active
    pub record: BuildRecord,
    /// The `current` link that now points at the install tree
    pub current_link: PathBuf,
    /// `bin/` links created by this activation
    pub linked: Vec<PathBuf>,
    /// Names left alone because `bin/` already had them, with their target
    pub skipped: Vec<(String, Option<PathBuf>)>,
    /// Names whose link could not be created, with the error
    pub failed: Vec<(String, String)>,
}

/// Applies activations to the registry and the filesystem
pub struct Switch<'a> {
    config: &'a Config,
    registry: &'a Registry,
    templates: &'a TemplateStore,
}

impl<'a> Switch<'a> {
    /// Switch over the given yard
    #[must_use]
    pub fn new(config: &'a Config, registry: &'a Registry, templates: &'a TemplateStore) -> Self {
        Self {
            config,
            registry,
            templates,
        }
    }

    /// Make the build of `software` at `commit` the active one
    pub fn activate(&self, software: &str, commit: &str) -> Result<ActivationReport> {
        let found = self
            .registry
            .find_build(software, commit)?
            .ok_or_else(|| Error::BuildNotFound {
                software: software.to_string(),
                commit: commit.to_string(),
            })?;
        let patterns = self.executable_patterns(software)?;

        if !self.registry.set_active(software, commit)? {
            return Err(Error::ActivationFailed {
                software: software.to_string(),
                commit: commit.to_string(),
            });
        }
        let record = BuildRecord {
            is_active: true,
            ..found
        };

        let current_link = self.config.current_link(software);
        remove_link(&current_link)?;
        if let Some(parent) = current_link.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        link_dir(&record.install_path, &current_link).map_err(|e| Error::io(&current_link, e))?;
        info!("{} -> {}", current_link.display(), record.install_path.display());

        let executables = find_executables(&record.install_path, &patterns);
        debug!("{} executables match in {}", executables.len(), record.install_path.display());

        let bin_dir = self.config.bin_dir();
        fs::create_dir_all(&bin_dir).map_err(|e| Error::io(&bin_dir, e))?;

        let links = link_into(&bin_dir, executables, link_file);
        let report = ActivationReport {
            record,
            current_link,
            linked: links.linked,
            skipped: links.skipped,
            failed: links.failed,
        };

        info!(
            "Activated {} at {}: {} linked, {} already present",
            software,
            commit,
            report.linked.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn executable_patterns(&self, software: &str) -> Result<GlobSet> {
        let patterns: Vec<String> = match self.templates.try_load(software)? {
            Some(template) if !template.executable_patterns.is_empty() => {
                template.executable_patterns
            }
            _ => DEFAULT_EXECUTABLE_PATTERNS.iter().map(ToString::to_string).collect(),
        };

        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }
}

/// Outcome of linking executables into `bin/`
#[derive(Debug, Default)]
struct BinLinks {
    linked: Vec<PathBuf>,
    skipped: Vec<(String, Option<PathBuf>)>,
    failed: Vec<(String, String)>,
}

/// Link each executable into `bin_dir` by file name with `link`
///
/// Names already present in `bin_dir` are skipped; a failed link is logged
/// and the remaining executables are still linked.
fn link_into<F>(bin_dir: &Path, executables: Vec<PathBuf>, link: F) -> BinLinks
where
    F: Fn(&Path, &Path) -> io::Result<()>,
{
    let mut links = BinLinks::default();

    for exe in executables {
        let Some(name) = exe.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let path = bin_dir.join(&name);

        if fs::symlink_metadata(&path).is_ok() {
            let existing = fs::read_link(&path).ok();
            debug!("bin/{} already exists; leaving it", name);
            links.skipped.push((name, existing));
            continue;
        }

        match link(&exe, &path) {
            Ok(()) => {
                debug!("{} -> {}", path.display(), exe.display());
                links.linked.push(path);
            }
            Err(e) => {
                warn!("Could not link {}: {}", path.display(), e);
                links.failed.push((name, e.to_string()));
            }
        }
    }

    links
}

/// Files under `root` whose file name matches `patterns`
///
/// When two files share a name the first in walk order wins.
fn find_executables(root: &Path, patterns: &GlobSet) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .filter(|entry| patterns.is_match(entry.file_name()))
        .filter(|entry| seen.insert(entry.file_name().to_os_string()))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Remove a symlink at `link`; absence is fine, a real directory is not
fn remove_link(link: &Path) -> Result<()> {
    match fs::symlink_metadata(link) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(link, e)),
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(link)
                .or_else(|_| fs::remove_dir(link))
                .map_err(|e| Error::io(link, e))
        }
        Ok(_) => Err(Error::io(
            link,
            io::Error::new(io::ErrorKind::AlreadyExists, "exists and is not a symlink"),
        )),
    }
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(unix)]
fn link_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(windows)]
fn link_file(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
