// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Active build commands - show and switch the build exposed on PATH

use super::{print_json, short, Context};
use crate::switch::{ActivationReport, Switch};
use anyhow::{anyhow, bail, Result};
use owo_colors::{OwoColorize, Stream};

/// Run active command
pub fn run(ctx: &Context, action: &str, software: Option<String>, commit: Option<String>) -> Result<()> {
    let registry = ctx.registry()?;

    match action {
        "get" | "show" => {
            let software = software.ok_or_else(|| anyhow!("Software name is required"))?;
            let active = registry.get_active(&software)?;

            if ctx.json {
                return print_json(&active);
            }

            match active {
                Some(record) => {
                    println!(
                        "{} {} (build #{})",
                        record.software.if_supports_color(Stream::Stdout, |t| t.bold()),
                        record.commit,
                        record.id
                    );
                    println!("  built:         {}", record.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
                    println!("  configuration: {}", record.configuration);
                    println!("  installed to:  {}", record.install_path.display());
                }
                None => println!("No active build for {}", software),
            }
        }

        "set" | "switch" => {
            let software = software.ok_or_else(|| anyhow!("Software name is required"))?;
            let commit = commit.ok_or_else(|| anyhow!("Commit hash is required"))?;

            ctx.config.ensure_layout()?;
            let templates = ctx.templates();
            let report = Switch::new(&ctx.config, &registry, &templates).activate(&software, &commit)?;

            if ctx.json {
                return print_json(&report);
            }

            println!(
                "Activated {} at {}",
                software.if_supports_color(Stream::Stdout, |t| t.bold()),
                short(&commit)
            );
            println!(
                "  {} -> {}",
                report.current_link.display(),
                report.record.install_path.display()
            );
            print_links(&report);
        }

        "list" | "ls" => {
            let active = registry.active_builds()?;

            if ctx.json {
                return print_json(&active);
            }

            if active.is_empty() {
                println!("No active builds. Use 'buildyard build <software>' to create one.");
                return Ok(());
            }

            println!("Active builds ({}):", active.len());
            for record in &active {
                println!(
                    "  {} {} {}",
                    record.software,
                    short(&record.commit),
                    record.install_path.display()
                );
            }
        }

        other => {
            bail!("Unknown action: {}. Valid: get, set, list", other);
        }
    }

    Ok(())
}

/// Print the bin/ links an activation created or skipped
pub fn print_links(report: &ActivationReport) {
    for link in &report.linked {
        println!("  linked  {}", link.display());
    }
    for (name, existing) in &report.skipped {
        let target = existing
            .as_ref()
            .map_or_else(|| "(not a link)".to_string(), |p| p.display().to_string());
        println!(
            "  {}    bin/{} already points at {}",
            "kept".if_supports_color(Stream::Stdout, |t| t.yellow()),
            name,
            target
        );
    }
    for (name, error) in &report.failed {
        println!(
            "  {}  bin/{}: {}",
            "failed".if_supports_color(Stream::Stdout, |t| t.red()),
            name,
            error
        );
    }
}
