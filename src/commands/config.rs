// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell

use super::{print_json, Context};
use anyhow::{bail, Context as _, Result};

/// Run config command
pub fn run(ctx: &Context, action: &str) -> Result<()> {
    match action {
        "show" => {
            if ctx.json {
                return print_json(&ctx.config);
            }
            let text = toml::to_string_pretty(&ctx.config).context("Failed to render configuration")?;
            print!("{}", text);
            println!("# database: {}", ctx.config.database_path().display());
        }
        "path" => match crate::config::default_config_file() {
            Some(path) => println!("{}", path.display()),
            None => bail!("No configuration directory on this platform"),
        },
        other => bail!("Unknown action: {}. Valid: show, path", other),
    }
    Ok(())
}
