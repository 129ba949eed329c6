// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository tracking - clone or refresh a source checkout

use crate::error::{Error, Result};
use crate::process::{run_checked, CommandSpec, ProcessRunner};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Version-control operations the tracker needs
pub trait Vcs {
    /// Clone `url` into `dest`
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    /// Switch the checkout at `dir` to `branch`
    fn checkout(&self, dir: &Path, branch: &str) -> Result<()>;
    /// Fetch and merge the tracked branch
    fn pull(&self, dir: &Path) -> Result<()>;
    /// Initialize and update submodules recursively
    fn update_submodules(&self, dir: &Path) -> Result<()>;
    /// Commit hash of HEAD
    fn head(&self, dir: &Path) -> Result<String>;
    /// Short name of the checked-out branch (None when detached)
    fn current_branch(&self, dir: &Path) -> Result<Option<String>>;
}

/// git command-line client; HEAD is read with gix
pub struct GitCli<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> GitCli<'a> {
    /// Use `runner` to execute git
    #[must_use]
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }

    fn git(&self, dir: Option<&Path>, args: &[&str]) -> Result<()> {
        let mut cmd = CommandSpec::new("git").args(args.iter().copied());
        if let Some(dir) = dir {
            cmd = cmd.current_dir(dir);
        }
        run_checked(self.runner, &cmd)?;
        Ok(())
    }

    fn open(dir: &Path) -> Result<gix::Repository> {
        gix::open(dir).map_err(|e| Error::Git(format!("{}: {e}", dir.display())))
    }
}

impl Vcs for GitCli<'_> {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let cmd = CommandSpec::new("git").arg("clone").arg(url).path_arg(dest);
        run_checked(self.runner, &cmd)?;
        Ok(())
    }

    fn checkout(&self, dir: &Path, branch: &str) -> Result<()> {
        self.git(Some(dir), &["checkout", branch])
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        self.git(Some(dir), &["pull"])
    }

    fn update_submodules(&self, dir: &Path) -> Result<()> {
        self.git(Some(dir), &["submodule", "update", "--init", "--recursive"])
    }

    fn head(&self, dir: &Path) -> Result<String> {
        let repo = Self::open(dir)?;
        let id = repo
            .head_id()
            .map_err(|e| Error::Git(format!("{}: {e}", dir.display())))?;
        Ok(id.to_string())
    }

    fn current_branch(&self, dir: &Path) -> Result<Option<String>> {
        let repo = Self::open(dir)?;
        let name = repo
            .head_name()
            .map_err(|e| Error::Git(format!("{}: {e}", dir.display())))?;
        Ok(name.map(|n| n.shorten().to_string()))
    }
}

/// State of a checkout after [`RepositoryTracker::ensure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// HEAD after the refresh
    pub commit: String,
    /// HEAD before the refresh (None for a fresh clone)
    pub previous: Option<String>,
    /// Whether the checkout was cloned by this call
    pub cloned: bool,
}

impl Checkout {
    /// Whether HEAD moved (always true for a fresh clone)
    #[must_use]
    pub fn changed(&self) -> bool {
        self.previous.as_deref() != Some(self.commit.as_str())
    }
}

/// Keeps a local checkout in step with its remote
pub struct RepositoryTracker<'a> {
    vcs: &'a dyn Vcs,
}

impl<'a> RepositoryTracker<'a> {
    /// Track checkouts through `vcs`
    #[must_use]
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    /// Clone or refresh `local_path` from `remote_url` on `branch`
    ///
    /// Whether HEAD moved is only reported; the caller decides whether a
    /// rebuild is worth doing.
    pub fn ensure(&self, local_path: &Path, remote_url: &str, branch: &str) -> Result<Checkout> {
        if !local_path.exists() {
            if let Some(parent) = local_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }

            info!("Cloning {} into {}", remote_url, local_path.display());
            self.vcs.clone_repo(remote_url, local_path)?;
            self.switch_branch(local_path, branch)?;
            self.vcs.update_submodules(local_path)?;

            let commit = self.vcs.head(local_path)?;
            info!("Cloned at {}", commit);
            return Ok(Checkout {
                commit,
                previous: None,
                cloned: true,
            });
        }

        let before = self.vcs.head(local_path)?;
        self.switch_branch(local_path, branch)?;

        debug!("Pulling {}", local_path.display());
        self.vcs.pull(local_path)?;
        self.vcs.update_submodules(local_path)?;

        let commit = self.vcs.head(local_path)?;
        let checkout = Checkout {
            commit,
            previous: Some(before),
            cloned: false,
        };

        if checkout.changed() {
            info!(
                "{} moved {} -> {}; rebuild needed",
                local_path.display(),
                checkout.previous.as_deref().unwrap_or_default(),
                checkout.commit
            );
        } else {
            info!("{} already at {}", local_path.display(), checkout.commit);
        }

        Ok(checkout)
    }

    fn switch_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        let current = self.vcs.current_branch(dir)?;
        if current.as_deref() != Some(branch) {
            debug!("Checking out {} (was {:?})", branch, current);
            self.vcs.checkout(dir, branch)?;
        }
        Ok(())
    }
}
