// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! History command - list registered builds, newest first

use super::{print_json, short, Context};
use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

/// Run the history command
pub fn run(ctx: &Context, software: Option<String>, limit: Option<usize>) -> Result<()> {
    let registry = ctx.registry()?;
    let mut records = registry.history(software.as_deref())?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    if ctx.json {
        return print_json(&records);
    }

    if records.is_empty() {
        match software {
            Some(name) => println!("No builds recorded for {}", name),
            None => println!("No builds recorded"),
        }
        return Ok(());
    }

    let mut last_software: Option<&str> = None;
    for record in &records {
        if last_software != Some(record.software.as_str()) {
            println!("{}", record.software.if_supports_color(Stream::Stdout, |t| t.bold()));
            last_software = Some(record.software.as_str());
        }

        let marker = if record.is_active { "*" } else { " " };
        println!(
            "  {} #{:<4} {} {}  {}",
            marker.if_supports_color(Stream::Stdout, |t| t.green()),
            record.id,
            short(&record.commit),
            record.built_at.format("%Y-%m-%d %H:%M"),
            record.configuration
        );
    }

    Ok(())
}
