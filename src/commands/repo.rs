// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Repository commands - inspect and forget tracked checkouts

use super::{print_json, short, Context};
use anyhow::{anyhow, bail, Context as _, Result};
use std::fs;
use tracing::info;

/// Run repo command
pub fn run(ctx: &Context, action: &str, software: Option<String>, purge: bool) -> Result<()> {
    let registry = ctx.registry()?;

    match action {
        "list" | "ls" => {
            let repos = registry.list_repositories()?;

            if ctx.json {
                return print_json(&repos);
            }

            if repos.is_empty() {
                println!("No repositories tracked. They are added by 'buildyard build'.");
                return Ok(());
            }

            println!("Repositories ({}):", repos.len());
            for repo in &repos {
                println!(
                    "  {} [{}] {} {}",
                    repo.software,
                    repo.branch,
                    short(&repo.current_hash),
                    repo.repo_url
                );
            }
        }

        "show" => {
            let software = software.ok_or_else(|| anyhow!("Software name is required"))?;
            let repo = registry
                .get_repository(&software)?
                .ok_or_else(|| anyhow!("Repository not tracked: {}", software))?;

            if ctx.json {
                return print_json(&repo);
            }

            println!("Repository: {}", repo.software);
            println!("  url:          {}", repo.repo_url);
            println!("  checkout:     {}", repo.local_path.display());
            println!("  branch:       {}", repo.branch);
            println!("  commit:       {}", repo.current_hash);
            println!("  last updated: {}", repo.last_updated.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        "remove" | "rm" => {
            let software = software.ok_or_else(|| anyhow!("Software name is required"))?;
            let repo = registry.get_repository(&software)?;

            if !registry.remove_repository(&software)? {
                println!("Repository not tracked: {}", software);
                return Ok(());
            }
            println!("Stopped tracking {}", software);

            if purge {
                if let Some(repo) = repo.filter(|r| r.local_path.exists()) {
                    info!("Deleting checkout {}", repo.local_path.display());
                    fs::remove_dir_all(&repo.local_path).with_context(|| {
                        format!("Failed to delete {}", repo.local_path.display())
                    })?;
                    println!("  deleted {}", repo.local_path.display());
                }
            }
        }

        other => {
            bail!("Unknown action: {}. Valid: list, show, remove", other);
        }
    }

    Ok(())
}
