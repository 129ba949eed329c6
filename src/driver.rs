// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Template build driver
//!
//! Resolve template, merge configuration, refresh the checkout, run the
//! build routine, register the build, activate it. Each step either
//! succeeds or aborts the whole run; nothing is registered for a build that
//! did not finish.

use crate::config::{validate_software_name, Config};
use crate::error::{Error, Result};
use crate::process::ProcessRunner;
use crate::registry::Registry;
use crate::repo::{RepositoryTracker, Vcs};
use crate::routines::{BuildContext, RoutineRegistry};
use crate::switch::{ActivationReport, Switch};
use crate::templates::TemplateStore;
use crate::types::{summarize, Configuration, RepositoryRecord, Template, INSTALL_DIRECTORY_KEY};
use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// What to build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Software (template) name
    pub software: String,
    /// Start from the template's default configuration
    pub use_defaults: bool,
    /// Explicit flags; later entries win over earlier ones and over defaults
    pub overrides: Vec<(String, String)>,
    /// Branch to build instead of the template's
    pub branch: Option<String>,
}

impl BuildRequest {
    /// Build `software` with template defaults and no overrides
    pub fn new(software: impl Into<String>) -> Self {
        Self {
            software: software.into(),
            use_defaults: true,
            overrides: Vec::new(),
            branch: None,
        }
    }
}

/// Outcome of a completed driver run
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Software built
    pub software: String,
    /// Commit built
    pub commit: String,
    /// Registry id of the build
    pub build_id: i64,
    /// Install tree
    pub install_path: PathBuf,
    /// Registry configuration summary
    pub configuration: String,
    /// Whether the refresh moved HEAD (or cloned)
    pub checkout_changed: bool,
    /// Time spent in the build routine's tools
    pub build_duration: Duration,
    /// Symlinks created by the activation
    pub activation: ActivationReport,
}

/// Template defaults overlaid with explicit overrides
#[must_use]
pub fn merge_configuration(
    template: &Template,
    use_defaults: bool,
    overrides: &[(String, String)],
) -> Configuration {
    let mut merged = if use_defaults {
        template.defaults()
    } else {
        Configuration::new()
    };
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Runs template builds end to end
pub struct Driver<'a> {
    config: &'a Config,
    templates: &'a TemplateStore,
    registry: &'a Registry,
    vcs: &'a dyn Vcs,
    routines: &'a RoutineRegistry,
    runner: &'a dyn ProcessRunner,
}

impl<'a> Driver<'a> {
    /// Driver over the given collaborators
    #[must_use]
    pub fn new(
        config: &'a Config,
        templates: &'a TemplateStore,
        registry: &'a Registry,
        vcs: &'a dyn Vcs,
        routines: &'a RoutineRegistry,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            config,
            templates,
            registry,
            vcs,
            routines,
            runner,
        }
    }

    /// Build, register and activate `request.software`
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let software = request.software.as_str();
        validate_software_name(software)?;

        // Resolve template and routine before touching anything
        let template = self.templates.load(software)?;
        let routine = self
            .routines
            .get(&template.build_function)
            .ok_or_else(|| Error::RoutineNotFound {
                software: software.to_string(),
                routine: template.build_function.clone(),
            })?;

        let mut configuration =
            merge_configuration(&template, request.use_defaults, &request.overrides);

        let branch = request
            .branch
            .clone()
            .or_else(|| template.branch.clone())
            .unwrap_or_else(|| self.config.default_branch.clone());
        let source_dir = self.config.source_dir(software);

        let checkout = RepositoryTracker::new(self.vcs).ensure(
            &source_dir,
            &template.repository,
            &branch,
        )?;
        self.registry.upsert_repository(&RepositoryRecord {
            id: 0,
            software: software.to_string(),
            repo_url: template.repository.clone(),
            local_path: source_dir.clone(),
            last_updated: Utc::now(),
            branch,
            current_hash: checkout.commit.clone(),
        })?;

        let install_dir = self.config.install_dir(software, &checkout.commit);
        configuration.insert(
            INSTALL_DIRECTORY_KEY.to_string(),
            install_dir.to_string_lossy().into_owned(),
        );
        let summary = summarize(&configuration);

        info!(
            "Building {} at {} with {} ({})",
            software, checkout.commit, template.build_function, summary
        );
        let ctx = BuildContext {
            software: software.to_string(),
            commit: checkout.commit.clone(),
            build_script: source_dir.join(&template.build_script),
            source_dir,
            software_root: self.config.software_root(software),
            install_dir: install_dir.clone(),
            configuration,
        };
        let outcome = routine.build(&ctx, self.runner)?;
        let install_path = outcome.install_dir.unwrap_or(install_dir);

        let build_id = self
            .registry
            .register(software, &checkout.commit, &summary, &install_path)?;

        let activation = Switch::new(self.config, self.registry, self.templates)
            .activate(software, &checkout.commit)?;

        Ok(BuildReport {
            software: software.to_string(),
            commit: checkout.commit.clone(),
            build_id,
            install_path,
            configuration: summary,
            checkout_changed: checkout.changed(),
            build_duration: outcome.duration,
            activation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::default_templates;
    use proptest::prelude::*;

    fn llvm() -> Template {
        default_templates().remove(0)
    }

    #[test]
    fn test_merge_defaults_with_overrides() {
        let overrides = vec![("CMAKE_BUILD_TYPE".to_string(), "Debug".to_string())];
        let merged = merge_configuration(&llvm(), true, &overrides);

        assert_eq!(merged["CMAKE_BUILD_TYPE"], "Debug");
        assert_eq!(merged["LLVM_ENABLE_PROJECTS"], "clang;lld");
        assert_eq!(merged["LLVM_ENABLE_ASSERTIONS"], "OFF");
    }

    #[test]
    fn test_merge_without_defaults() {
        let overrides = vec![("CMAKE_BUILD_TYPE".to_string(), "Debug".to_string())];
        let merged = merge_configuration(&llvm(), false, &overrides);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["CMAKE_BUILD_TYPE"], "Debug");
    }

    proptest! {
        #[test]
        fn prop_last_override_wins(
            values in proptest::collection::vec("[a-zA-Z0-9]{1,8}", 1..6)
        ) {
            let overrides: Vec<_> = values
                .iter()
                .map(|v| ("CMAKE_BUILD_TYPE".to_string(), v.clone()))
                .collect();
            let merged = merge_configuration(&llvm(), true, &overrides);

            prop_assert_eq!(&merged["CMAKE_BUILD_TYPE"], values.last().unwrap());
            prop_assert_eq!(&merged["LLVM_TARGETS_TO_BUILD"], "X86;AArch64");
        }

        #[test]
        fn prop_unspecified_defaults_survive(key in "[A-Z_]{3,12}", value in "[a-z]{1,6}") {
            let template = llvm();
            let overrides = vec![(key.clone(), value.clone())];
            let merged = merge_configuration(&template, true, &overrides);

            for (k, v) in template.defaults() {
                if k != key {
                    prop_assert_eq!(&merged[&k], &v);
                }
            }
            prop_assert_eq!(&merged[&key], &value);
        }
    }
}
