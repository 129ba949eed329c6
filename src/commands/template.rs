// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Template commands - list, inspect, register and migrate build templates

use super::{print_json, Context};
use crate::routines::RoutineRegistry;
use crate::templates::legacy_routine_names;
use anyhow::{anyhow, bail, Context as _, Result};
use owo_colors::{OwoColorize, Stream};
use std::path::PathBuf;

/// Run template command
pub fn run(
    ctx: &Context,
    action: &str,
    name: Option<String>,
    file: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let store = ctx.templates();

    match action {
        "list" | "ls" => {
            let templates = store.list()?;

            if ctx.json {
                return print_json(&templates);
            }

            if templates.is_empty() {
                println!(
                    "No templates defined in {}. Use 'buildyard template init' to install the defaults.",
                    store.dir().display()
                );
                return Ok(());
            }

            let routines = RoutineRegistry::with_builtins();
            println!("Templates ({}):", templates.len());
            for template in &templates {
                let routine = if routines.get(&template.build_function).is_some() {
                    template.build_function.clone()
                } else {
                    format!("{} (unknown routine)", template.build_function)
                };
                println!(
                    "  {} [{}] {}",
                    template.name.if_supports_color(Stream::Stdout, |t| t.bold()),
                    routine,
                    template.description
                );
            }
        }

        "show" => {
            let name = name.ok_or_else(|| anyhow!("Template name is required"))?;
            let template = store.load(&name)?;

            if ctx.json {
                return print_json(&template);
            }

            println!("Template: {}", template.name);
            if !template.description.is_empty() {
                println!("  description:    {}", template.description);
            }
            println!("  repository:     {}", template.repository);
            if let Some(branch) = &template.branch {
                println!("  branch:         {}", branch);
            }
            println!("  build script:   {}", template.build_script);
            println!("  build function: {}", template.build_function);
            println!("  executables:    {}", template.executable_patterns.join(", "));
            println!("  defaults:");
            for (key, value) in template.defaults() {
                println!("    {} = {}", key, value);
            }
        }

        "register" | "add" => {
            let file = file
                .or_else(|| name.map(PathBuf::from))
                .ok_or_else(|| anyhow!("Template file is required"))?;
            let template = store
                .register_file(&file)
                .with_context(|| format!("Failed to register {}", file.display()))?;

            println!("Registered template: {}", template.name);
            if RoutineRegistry::with_builtins().get(&template.build_function).is_none() {
                println!(
                    "  {} build function '{}' is not a known routine",
                    "warning:".if_supports_color(Stream::Stdout, |t| t.yellow()),
                    template.build_function
                );
            }
        }

        "init" => {
            ctx.config.ensure_layout()?;
            let written = store.install_defaults(force)?;

            if written.is_empty() {
                println!("Default templates already present (use --force to overwrite)");
            } else {
                println!("Installed templates: {}", written.join(", "));
            }
        }

        "migrate" => {
            let changed = store.migrate(&legacy_routine_names())?;

            if changed.is_empty() {
                println!("All templates already use current routine names");
            } else {
                println!("Migrated templates: {}", changed.join(", "));
            }
        }

        other => {
            bail!("Unknown action: {}. Valid: list, show, register, init, migrate", other);
        }
    }

    Ok(())
}
