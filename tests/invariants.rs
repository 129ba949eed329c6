// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for the build registry and the active-build switch
//!
//! These tests verify critical invariants:
//! 1. Registration is idempotent per (software, commit, configuration)
//! 2. At most one build per software is active
//! 3. The filesystem links follow the registry's active build

use buildyard::config::Config;
use buildyard::registry::Registry;
use buildyard::templates::{default_templates, TemplateStore};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

struct Yard {
    _dir: TempDir,
    config: Config,
    registry: Registry,
    templates: TemplateStore,
}

fn yard() -> Yard {
    let dir = TempDir::new().unwrap();
    let config = Config::with_root(dir.path().join("yard"));
    config.ensure_layout().unwrap();
    let registry = Registry::open(&config.database_path()).unwrap();
    let templates = TemplateStore::new(config.templates_dir());
    Yard {
        _dir: dir,
        config,
        registry,
        templates,
    }
}

/// Create an install tree for `software` at `commit` holding `files`
fn install(config: &Config, software: &str, commit: &str, files: &[&str]) -> PathBuf {
    let root = config.install_dir(software, commit);
    for file in files {
        let path = root.join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
    }
    std::fs::create_dir_all(&root).unwrap();
    root
}

fn active_count(registry: &Registry, software: &str) -> usize {
    registry
        .history(Some(software))
        .unwrap()
        .iter()
        .filter(|b| b.is_active)
        .count()
}

// =============================================================================
// Registry invariants
// =============================================================================

#[test]
fn test_register_is_idempotent() {
    let yard = yard();
    let path = Path::new("/yard/llvm/abc123");

    let first = yard
        .registry
        .register("llvm", "abc123", "CMAKE_BUILD_TYPE=Release", path)
        .unwrap();
    let second = yard
        .registry
        .register("llvm", "abc123", "CMAKE_BUILD_TYPE=Release", path)
        .unwrap();

    assert_eq!(first, 1);
    assert_eq!(first, second);
    assert_eq!(yard.registry.history(Some("llvm")).unwrap().len(), 1);
}

#[test]
fn test_distinct_configurations_are_distinct_builds() {
    let yard = yard();
    let path = Path::new("/yard/llvm/abc123");

    let release = yard
        .registry
        .register("llvm", "abc123", "CMAKE_BUILD_TYPE=Release", path)
        .unwrap();
    let debug = yard
        .registry
        .register("llvm", "abc123", "CMAKE_BUILD_TYPE=Debug", path)
        .unwrap();

    assert_ne!(release, debug);
    assert_eq!(yard.registry.history(Some("llvm")).unwrap().len(), 2);
}

#[test]
fn test_at_most_one_active_build() {
    let yard = yard();
    for commit in ["aaa", "bbb", "ccc"] {
        yard.registry
            .register("llvm", commit, "", Path::new("/yard/llvm"))
            .unwrap();
    }

    for commit in ["aaa", "ccc", "bbb", "bbb"] {
        assert!(yard.registry.set_active("llvm", commit).unwrap());
        assert_eq!(active_count(&yard.registry, "llvm"), 1);
        assert_eq!(yard.registry.get_active("llvm").unwrap().unwrap().commit, commit);
    }
}

#[test]
fn test_activation_is_per_software() {
    let yard = yard();
    yard.registry
        .register("llvm", "aaa", "", Path::new("/yard/llvm/aaa"))
        .unwrap();
    yard.registry
        .register("pwsh", "bbb", "", Path::new("/yard/pwsh/bbb"))
        .unwrap();

    yard.registry.set_active("llvm", "aaa").unwrap();
    yard.registry.set_active("pwsh", "bbb").unwrap();

    let active: Vec<_> = yard
        .registry
        .active_builds()
        .unwrap()
        .into_iter()
        .map(|b| (b.software, b.commit))
        .collect();
    assert_eq!(
        active,
        vec![("llvm".to_string(), "aaa".to_string()), ("pwsh".to_string(), "bbb".to_string())]
    );
}

#[test]
fn test_unknown_commit_clears_active_build() {
    let yard = yard();
    yard.registry
        .register("llvm", "aaa", "", Path::new("/yard/llvm/aaa"))
        .unwrap();
    yard.registry.set_active("llvm", "aaa").unwrap();

    assert!(!yard.registry.set_active("llvm", "zzz").unwrap());
    assert!(yard.registry.get_active("llvm").unwrap().is_none());
}

#[test]
fn test_history_order() {
    let yard = yard();
    let path = Path::new("/yard");
    yard.registry.register("pwsh", "p1", "", path).unwrap();
    yard.registry.register("llvm", "l1", "", path).unwrap();
    yard.registry.register("llvm", "l2", "", path).unwrap();
    yard.registry.register("pwsh", "p2", "", path).unwrap();

    let llvm: Vec<_> = yard
        .registry
        .history(Some("llvm"))
        .unwrap()
        .into_iter()
        .map(|b| b.commit)
        .collect();
    assert_eq!(llvm, vec!["l2", "l1"]);

    let all: Vec<_> = yard
        .registry
        .history(None)
        .unwrap()
        .into_iter()
        .map(|b| b.commit)
        .collect();
    assert_eq!(all, vec!["l2", "l1", "p2", "p1"]);
}

#[test]
fn test_registry_survives_reopen() {
    let yard = yard();
    yard.registry
        .register("llvm", "aaa", "CMAKE_BUILD_TYPE=Release", Path::new("/yard/llvm/aaa"))
        .unwrap();
    yard.registry.set_active("llvm", "aaa").unwrap();

    let reopened = Registry::open(&yard.config.database_path()).unwrap();
    let active = reopened.get_active("llvm").unwrap().unwrap();
    assert_eq!(active.commit, "aaa");
    assert_eq!(active.configuration, "CMAKE_BUILD_TYPE=Release");
}

// =============================================================================
// Switch invariants
// =============================================================================

#[cfg(unix)]
mod links {
    use super::*;
    use buildyard::switch::Switch;
    use buildyard::Error;
    use std::fs;

    #[test]
    fn test_current_follows_active_build() {
        let yard = yard();
        let first = install(&yard.config, "llvm", "aaa", &["bin/tool.exe"]);
        let second = install(&yard.config, "llvm", "bbb", &["bin/tool.exe"]);
        yard.registry.register("llvm", "aaa", "", &first).unwrap();
        yard.registry.register("llvm", "bbb", "", &second).unwrap();

        let switch = Switch::new(&yard.config, &yard.registry, &yard.templates);
        let current = yard.config.current_link("llvm");

        switch.activate("llvm", "aaa").unwrap();
        assert_eq!(fs::read_link(&current).unwrap(), first);

        switch.activate("llvm", "bbb").unwrap();
        assert_eq!(fs::read_link(&current).unwrap(), second);
        assert_eq!(yard.registry.get_active("llvm").unwrap().unwrap().commit, "bbb");
    }

    #[test]
    fn test_existing_bin_links_are_kept() {
        let yard = yard();
        let first = install(&yard.config, "llvm", "aaa", &["bin/tool.exe"]);
        let second = install(&yard.config, "llvm", "bbb", &["bin/tool.exe", "bin/new.cmd"]);
        yard.registry.register("llvm", "aaa", "", &first).unwrap();
        yard.registry.register("llvm", "bbb", "", &second).unwrap();

        let switch = Switch::new(&yard.config, &yard.registry, &yard.templates);
        switch.activate("llvm", "aaa").unwrap();
        let report = switch.activate("llvm", "bbb").unwrap();

        let bin = yard.config.bin_dir();
        assert_eq!(fs::read_link(bin.join("tool.exe")).unwrap(), first.join("bin/tool.exe"));
        assert_eq!(fs::read_link(bin.join("new.cmd")).unwrap(), second.join("bin/new.cmd"));
        assert_eq!(report.linked, vec![bin.join("new.cmd")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, "tool.exe");
    }

    #[test]
    fn test_template_patterns_select_executables() {
        let yard = yard();
        yard.templates.save(&default_templates().remove(0)).unwrap();
        let tree = install(
            &yard.config,
            "llvm",
            "aaa",
            &["bin/clang", "bin/lld", "bin/llvm-ar", "bin/FileCheck", "lib/libLLVM.so"],
        );
        yard.registry.register("llvm", "aaa", "", &tree).unwrap();

        let report = Switch::new(&yard.config, &yard.registry, &yard.templates)
            .activate("llvm", "aaa")
            .unwrap();

        let mut names: Vec<_> = report
            .linked
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["clang", "lld", "llvm-ar"]);
    }

    #[test]
    fn test_default_patterns_without_template() {
        let yard = yard();
        let tree = install(
            &yard.config,
            "tool",
            "aaa",
            &["run.exe", "setup.cmd", "env.bat", "readme.txt", "tool"],
        );
        yard.registry.register("tool", "aaa", "", &tree).unwrap();

        let report = Switch::new(&yard.config, &yard.registry, &yard.templates)
            .activate("tool", "aaa")
            .unwrap();

        assert_eq!(report.linked.len(), 3);
        assert!(fs::symlink_metadata(yard.config.bin_dir().join("readme.txt")).is_err());
    }

    #[test]
    fn test_unreadable_template_changes_nothing() {
        let yard = yard();
        let first = install(&yard.config, "tool", "aaa", &["run.exe"]);
        let second = install(&yard.config, "tool", "bbb", &["run.exe", "new.exe"]);
        yard.registry.register("tool", "aaa", "", &first).unwrap();
        yard.registry.register("tool", "bbb", "", &second).unwrap();

        let switch = Switch::new(&yard.config, &yard.registry, &yard.templates);
        switch.activate("tool", "aaa").unwrap();

        fs::write(yard.config.templates_dir().join("tool.json"), "{ not json").unwrap();

        let err = switch.activate("tool", "bbb").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert_eq!(yard.registry.get_active("tool").unwrap().unwrap().commit, "aaa");
        assert_eq!(fs::read_link(yard.config.current_link("tool")).unwrap(), first);
        assert!(fs::symlink_metadata(yard.config.bin_dir().join("new.exe")).is_err());
    }

    #[test]
    fn test_missing_build_changes_nothing() {
        let yard = yard();
        let tree = install(&yard.config, "llvm", "aaa", &["bin/tool.exe"]);
        yard.registry.register("llvm", "aaa", "", &tree).unwrap();

        let switch = Switch::new(&yard.config, &yard.registry, &yard.templates);
        switch.activate("llvm", "aaa").unwrap();

        let err = switch.activate("llvm", "zzz").unwrap_err();
        assert!(matches!(err, Error::BuildNotFound { .. }));
        assert_eq!(yard.registry.get_active("llvm").unwrap().unwrap().commit, "aaa");
        assert_eq!(fs::read_link(yard.config.current_link("llvm")).unwrap(), tree);
    }
}
