// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build command - run a template build end to end

use super::{print_json, short, Context};
use crate::driver::{BuildRequest, Driver};
use crate::process::SystemRunner;
use crate::repo::GitCli;
use crate::routines::RoutineRegistry;
use anyhow::{Context as _, Result};
use owo_colors::{OwoColorize, Stream};

/// Run the build command
pub fn run(
    ctx: &Context,
    software: String,
    no_defaults: bool,
    defines: Vec<(String, String)>,
    branch: Option<String>,
) -> Result<()> {
    ctx.config.ensure_layout()?;

    let registry = ctx.registry()?;
    let templates = ctx.templates();
    let runner = SystemRunner;
    let git = GitCli::new(&runner);
    let routines = RoutineRegistry::with_builtins();

    let request = BuildRequest {
        software,
        use_defaults: !no_defaults,
        overrides: defines,
        branch,
    };

    let report = Driver::new(&ctx.config, &templates, &registry, &git, &routines, &runner)
        .build(&request)
        .with_context(|| format!("Build of {} failed", request.software))?;

    if ctx.json {
        return print_json(&report);
    }

    println!(
        "Built {} at {} (build #{})",
        report.software.if_supports_color(Stream::Stdout, |t| t.bold()),
        short(&report.commit),
        report.build_id
    );
    if !report.checkout_changed {
        println!("  checkout unchanged since last refresh");
    }
    println!("  configuration: {}", report.configuration);
    println!("  installed to:  {}", report.install_path.display());
    println!("  build time:    {:.1?}", report.build_duration);
    println!(
        "  {} -> {}",
        report.activation.current_link.display(),
        report.install_path.display()
    );

    super::active::print_links(&report.activation);

    Ok(())
}

/// Parse a `KEY=VALUE` command-line definition
pub fn parse_define(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_define() {
        assert_eq!(
            parse_define("CMAKE_BUILD_TYPE=Debug").unwrap(),
            ("CMAKE_BUILD_TYPE".to_string(), "Debug".to_string())
        );
        assert_eq!(
            parse_define("LLVM_ENABLE_PROJECTS=clang;lld=x").unwrap().1,
            "clang;lld=x"
        );
        assert_eq!(parse_define("EMPTY=").unwrap().1, "");
        assert!(parse_define("novalue").is_err());
        assert!(parse_define("=x").is_err());
    }
}
