// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Template store - one JSON build template per software

use crate::config::validate_software_name;
use crate::error::{Error, Result};
use crate::types::Template;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Executable patterns used for software without a template
pub const DEFAULT_EXECUTABLE_PATTERNS: &[&str] = &["*.exe", "*.cmd", "*.bat"];

/// Reads and writes `<dir>/<name>.json` template documents
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the templates
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Whether a template named `name` exists
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Load the template for `name`
    pub fn load(&self, name: &str) -> Result<Template> {
        self.try_load(name)?
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }

    /// Load the template for `name` if one exists
    pub fn try_load(&self, name: &str) -> Result<Option<Template>> {
        validate_software_name(name)?;
        let path = self.path_for(name);
        if !path.is_file() {
            return Ok(None);
        }
        read_template(&path).map(Some)
    }

    /// All templates sorted by name
    pub fn list(&self) -> Result<Vec<Template>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let mut templates = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                templates.push(read_template(&path)?);
            }
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    /// Validate and write `template`, replacing any existing document
    pub fn save(&self, template: &Template) -> Result<PathBuf> {
        validate(template)?;

        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.path_for(&template.name);
        let json = serde_json::to_string_pretty(template)?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))?;

        debug!("Wrote template {}", path.display());
        Ok(path)
    }

    /// Copy a template document from `source` into the store
    pub fn register_file(&self, source: &Path) -> Result<Template> {
        let template = read_template(source)?;
        self.save(&template)?;
        info!("Registered template {}", template.name);
        Ok(template)
    }

    /// Write the built-in templates, returning the names written
    ///
    /// Existing templates are left alone unless `overwrite` is set.
    pub fn install_defaults(&self, overwrite: bool) -> Result<Vec<String>> {
        let mut written = Vec::new();
        for template in default_templates() {
            if !overwrite && self.exists(&template.name) {
                debug!("Keeping existing template {}", template.name);
                continue;
            }
            self.save(&template)?;
            written.push(template.name);
        }
        Ok(written)
    }

    /// Rename build routine identifiers, returning the templates changed
    pub fn migrate(&self, renames: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        for mut template in self.list()? {
            if let Some(new_name) = renames.get(&template.build_function) {
                info!(
                    "Template {}: build function {} -> {}",
                    template.name, template.build_function, new_name
                );
                template.build_function = new_name.clone();
                self.save(&template)?;
                changed.push(template.name);
            }
        }
        Ok(changed)
    }
}

fn read_template(path: &Path) -> Result<Template> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let template: Template = serde_json::from_str(&content)?;
    validate(&template)?;
    Ok(template)
}

/// Check that a template can drive a build
pub fn validate(template: &Template) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidTemplate {
        name: template.name.clone(),
        reason: reason.to_string(),
    };

    validate_software_name(&template.name)?;
    if template.repository.trim().is_empty() {
        return Err(invalid("repository is empty"));
    }
    if template.build_function.trim().is_empty() {
        return Err(invalid("buildFunction is empty"));
    }
    if template.build_script.trim().is_empty() {
        return Err(invalid("buildScript is empty"));
    }
    for pattern in &template.executable_patterns {
        globset::Glob::new(pattern)?;
    }
    Ok(())
}

/// Identifier renames applied by `template migrate`
#[must_use]
pub fn legacy_routine_names() -> BTreeMap<String, String> {
    [
        ("llvm", "cmake-ninja"),
        ("cmake", "cmake-ninja"),
        ("dotnet", "dotnet-publish"),
        ("powershell", "dotnet-publish"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

/// Templates shipped with the tool
#[must_use]
pub fn default_templates() -> Vec<Template> {
    vec![
        Template {
            name: "llvm".into(),
            description: "LLVM with clang and lld, built with CMake and Ninja".into(),
            repository: "https://github.com/llvm/llvm-project.git".into(),
            branch: Some("main".into()),
            build_script: "llvm".into(),
            build_function: "cmake-ninja".into(),
            default_configuration: [
                ("CMAKE_BUILD_TYPE", json!("Release")),
                ("LLVM_ENABLE_PROJECTS", json!(["clang", "lld"])),
                ("LLVM_TARGETS_TO_BUILD", json!(["X86", "AArch64"])),
                ("LLVM_ENABLE_ASSERTIONS", json!(false)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            configuration_schema: json!({
                "CMAKE_BUILD_TYPE": ["Debug", "Release", "RelWithDebInfo", "MinSizeRel"],
                "LLVM_ENABLE_PROJECTS": "semicolon-separated project list",
                "LLVM_TARGETS_TO_BUILD": "semicolon-separated target list",
                "LLVM_ENABLE_ASSERTIONS": "boolean"
            }),
            executable_patterns: vec![
                "clang*".into(),
                "lld*".into(),
                "ld.lld*".into(),
                "llvm-*".into(),
                "*.exe".into(),
            ],
        },
        Template {
            name: "pwsh".into(),
            description: "PowerShell, published with the dotnet CLI".into(),
            repository: "https://github.com/PowerShell/PowerShell.git".into(),
            branch: Some("master".into()),
            build_script: "src/powershell-unix/powershell-unix.csproj".into(),
            build_function: "dotnet-publish".into(),
            default_configuration: [
                ("Configuration", json!("Release")),
                ("SelfContained", json!("false")),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
            configuration_schema: json!({
                "Configuration": ["Debug", "Release"],
                "SelfContained": ["true", "false"]
            }),
            executable_patterns: vec!["pwsh".into(), "pwsh.exe".into()],
        },
    ]
}
