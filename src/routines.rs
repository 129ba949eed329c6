// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build routines - typed replacements for "call the function named X"
//!
//! A template names its routine by identifier; the driver looks the
//! identifier up in a [`RoutineRegistry`] and hands the routine a
//! [`BuildContext`].

use crate::error::{Error, Result};
use crate::process::{run_checked, CommandSpec, ProcessRunner};
use crate::types::{Configuration, INSTALL_DIRECTORY_KEY};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything a routine needs to build one commit
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Software being built
    pub software: String,
    /// Commit being built
    pub commit: String,
    /// Source checkout
    pub source_dir: PathBuf,
    /// `<root>/<software>`, home of build trees and the in-progress marker
    pub software_root: PathBuf,
    /// Template build entry point resolved against the checkout
    pub build_script: PathBuf,
    /// Where the build should install itself
    pub install_dir: PathBuf,
    /// Merged flags, including the injected install directory
    pub configuration: Configuration,
}

impl BuildContext {
    /// Flags without the injected install directory
    pub fn flags(&self) -> impl Iterator<Item = (&String, &String)> {
        self.configuration
            .iter()
            .filter(|(k, _)| k.as_str() != INSTALL_DIRECTORY_KEY)
    }
}

/// Result of a successful build
#[derive(Debug, Clone, Default)]
pub struct BuildOutcome {
    /// Install tree, when the routine put it somewhere other than asked
    pub install_dir: Option<PathBuf>,
    /// Total time spent in external tools
    pub duration: Duration,
}

/// A way of building software from a checkout
pub trait BuildRoutine {
    /// Build and install `ctx.commit`
    fn build(&self, ctx: &BuildContext, runner: &dyn ProcessRunner) -> Result<BuildOutcome>;
}

/// Routines by identifier
#[derive(Default)]
pub struct RoutineRegistry {
    routines: BTreeMap<String, Box<dyn BuildRoutine>>,
}

impl RoutineRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `cmake-ninja`, `dotnet-publish` and `script`
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("cmake-ninja", CmakeNinja);
        registry.register("dotnet-publish", DotnetPublish);
        registry.register("script", Script);
        registry
    }

    /// Add or replace the routine for `name`
    pub fn register(&mut self, name: impl Into<String>, routine: impl BuildRoutine + 'static) {
        self.routines.insert(name.into(), Box::new(routine));
    }

    /// Routine for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BuildRoutine> {
        self.routines.get(name).map(AsRef::as_ref)
    }

    /// Registered identifiers, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routines.keys().map(String::as_str)
    }
}

// =============================================================================
// Build-in-progress marker
// =============================================================================

/// Marker file held for the duration of one build of a software
///
/// A second build of the same software finds the marker and refuses to
/// start. The marker is removed on drop, whether the build succeeded or not.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Marker file name under the software root
    pub const FILE_NAME: &'static str = ".build-in-progress";

    /// Create the marker in `dir`
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let path = dir.join(Self::FILE_NAME);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::BuildInProgress(path));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };
        writeln!(file, "{}", std::process::id()).map_err(|e| Error::io(&path, e))?;

        debug!("Holding {}", path.display());
        Ok(Self { path })
    }

    /// Marker path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

fn timed(runner: &dyn ProcessRunner, cmd: &CommandSpec, total: &mut Duration) -> Result<()> {
    info!("{}", cmd);
    let output = run_checked(runner, cmd)?;
    *total += output.duration;
    Ok(())
}

// =============================================================================
// Built-in routines
// =============================================================================

/// Configure with CMake for Ninja, then `ninja install`
///
/// Every flag becomes a `-D<key>=<value>` cache entry; the install
/// directory becomes `CMAKE_INSTALL_PREFIX`. The build tree lives at
/// `<root>/<software>/build` so incremental builds survive between commits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmakeNinja;

impl BuildRoutine for CmakeNinja {
    fn build(&self, ctx: &BuildContext, runner: &dyn ProcessRunner) -> Result<BuildOutcome> {
        let _lock = BuildLock::acquire(&ctx.software_root)?;
        let build_dir = ctx.software_root.join("build");
        let started = Instant::now();
        let mut tools = Duration::ZERO;

        let configure = CommandSpec::new("cmake")
            .args(["-G", "Ninja", "-S"])
            .path_arg(&ctx.build_script)
            .arg("-B")
            .path_arg(&build_dir)
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", ctx.install_dir.display()))
            .args(ctx.flags().map(|(k, v)| format!("-D{k}={v}")));
        timed(runner, &configure, &mut tools)?;

        let install = CommandSpec::new("ninja")
            .arg("-C")
            .path_arg(&build_dir)
            .arg("install");
        timed(runner, &install, &mut tools)?;

        debug!("cmake-ninja wall time {:?}", started.elapsed());
        Ok(BuildOutcome {
            install_dir: None,
            duration: tools,
        })
    }
}

/// `dotnet publish` of a project or solution
///
/// `Configuration` selects `-c` (Release when absent); every other flag
/// becomes an MSBuild property.
#[derive(Debug, Default, Clone, Copy)]
pub struct DotnetPublish;

impl BuildRoutine for DotnetPublish {
    fn build(&self, ctx: &BuildContext, runner: &dyn ProcessRunner) -> Result<BuildOutcome> {
        let _lock = BuildLock::acquire(&ctx.software_root)?;
        let mut tools = Duration::ZERO;

        let configuration = ctx
            .configuration
            .get("Configuration")
            .map_or("Release", String::as_str);

        let publish = CommandSpec::new("dotnet")
            .arg("publish")
            .path_arg(&ctx.build_script)
            .args(["-c", configuration, "-o"])
            .path_arg(&ctx.install_dir)
            .args(
                ctx.flags()
                    .filter(|(k, _)| k.as_str() != "Configuration")
                    .map(|(k, v)| format!("-p:{k}={v}")),
            )
            .current_dir(&ctx.source_dir);
        timed(runner, &publish, &mut tools)?;

        Ok(BuildOutcome {
            install_dir: None,
            duration: tools,
        })
    }
}

/// Run the template's build script with `--<key>=<value>` arguments
///
/// The script receives the install directory as `--InstallDirectory=...`
/// and is responsible for installing there.
#[derive(Debug, Default, Clone, Copy)]
pub struct Script;

impl BuildRoutine for Script {
    fn build(&self, ctx: &BuildContext, runner: &dyn ProcessRunner) -> Result<BuildOutcome> {
        let mut tools = Duration::ZERO;

        let cmd = CommandSpec::new(ctx.build_script.to_string_lossy())
            .args(ctx.configuration.iter().map(|(k, v)| format!("--{k}={v}")))
            .current_dir(&ctx.source_dir);
        timed(runner, &cmd, &mut tools)?;

        Ok(BuildOutcome {
            install_dir: None,
            duration: tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingRunner {
        commands: RefCell<Vec<CommandSpec>>,
        fail_program: Option<&'static str>,
    }

    impl ProcessRunner for RecordingRunner {
        fn run(&self, cmd: &CommandSpec) -> Result<ProcessOutput> {
            self.commands.borrow_mut().push(cmd.clone());
            let code = if self.fail_program == Some(cmd.program.as_str()) { 1 } else { 0 };
            Ok(ProcessOutput {
                code: Some(code),
                ..ProcessOutput::default()
            })
        }
    }

    fn context(root: &Path) -> BuildContext {
        let install_dir = root.join("llvm").join("abc123");
        let mut configuration = Configuration::new();
        configuration.insert("CMAKE_BUILD_TYPE".into(), "Release".into());
        configuration.insert(
            INSTALL_DIRECTORY_KEY.into(),
            install_dir.to_string_lossy().into_owned(),
        );

        BuildContext {
            software: "llvm".into(),
            commit: "abc123".into(),
            source_dir: root.join("llvm").join("src"),
            software_root: root.join("llvm"),
            build_script: root.join("llvm").join("src").join("llvm"),
            install_dir,
            configuration,
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = RoutineRegistry::with_builtins();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["cmake-ninja", "dotnet-publish", "script"]);
        assert!(registry.get("cmake-ninja").is_some());
        assert!(registry.get("Build-LLVM").is_none());
    }

    #[test]
    fn test_cmake_ninja_commands() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(dir.path());
        let runner = RecordingRunner::default();

        CmakeNinja.build(&ctx, &runner).unwrap();

        let commands = runner.commands.borrow();
        assert_eq!(commands.len(), 2);

        let configure = &commands[0];
        assert_eq!(configure.program, "cmake");
        assert!(configure.args.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
        assert!(configure
            .args
            .contains(&format!("-DCMAKE_INSTALL_PREFIX={}", ctx.install_dir.display())));
        assert!(!configure.args.iter().any(|a| a.contains(INSTALL_DIRECTORY_KEY)));

        let install = &commands[1];
        assert_eq!(install.program, "ninja");
        assert_eq!(install.args.last().map(String::as_str), Some("install"));

        // Marker is gone once the build returns
        assert!(!ctx.software_root.join(BuildLock::FILE_NAME).exists());
    }

    #[test]
    fn test_failed_build_releases_marker() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(dir.path());
        let runner = RecordingRunner {
            fail_program: Some("ninja"),
            ..RecordingRunner::default()
        };

        let err = CmakeNinja.build(&ctx, &runner).unwrap_err();
        assert!(matches!(err, Error::ToolFailed { .. }));
        assert!(!ctx.software_root.join(BuildLock::FILE_NAME).exists());
    }

    #[test]
    fn test_marker_blocks_second_build() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(dir.path());
        let held = BuildLock::acquire(&ctx.software_root).unwrap();

        let runner = RecordingRunner::default();
        let err = CmakeNinja.build(&ctx, &runner).unwrap_err();

        assert!(matches!(err, Error::BuildInProgress(ref p) if p == held.path()));
        assert!(runner.commands.borrow().is_empty());

        // The losing build must not remove the holder's marker
        assert!(held.path().exists());
        drop(held);
        assert!(!ctx.software_root.join(BuildLock::FILE_NAME).exists());
    }

    #[test]
    fn test_dotnet_publish_properties() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut ctx = context(dir.path());
        ctx.configuration.clear();
        ctx.configuration.insert("Configuration".into(), "Debug".into());
        ctx.configuration.insert("SelfContained".into(), "false".into());
        let runner = RecordingRunner::default();

        DotnetPublish.build(&ctx, &runner).unwrap();

        let commands = runner.commands.borrow();
        let publish = &commands[0];
        assert_eq!(publish.program, "dotnet");
        assert_eq!(publish.args[0], "publish");
        assert!(publish.args.windows(2).any(|w| w[0] == "-c" && w[1] == "Debug"));
        assert!(publish.args.contains(&"-p:SelfContained=false".to_string()));
        assert!(!publish.args.iter().any(|a| a.starts_with("-p:Configuration")));
    }

    #[test]
    fn test_script_receives_named_arguments() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = context(dir.path());
        let runner = RecordingRunner::default();

        Script.build(&ctx, &runner).unwrap();

        let commands = runner.commands.borrow();
        let cmd = &commands[0];
        assert_eq!(cmd.program, ctx.build_script.to_string_lossy());
        assert_eq!(
            cmd.args,
            vec![
                "--CMAKE_BUILD_TYPE=Release".to_string(),
                format!("--{}={}", INSTALL_DIRECTORY_KEY, ctx.install_dir.display()),
            ]
        );
        assert_eq!(cmd.cwd.as_deref(), Some(ctx.source_dir.as_path()));
    }
}
