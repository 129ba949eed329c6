// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Buildyard CLI - clone, build, register and switch toolchain builds

use anyhow::Result;
use buildyard::commands::{self, build::parse_define, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "buildyard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "BUILDYARD_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Root directory override (bin/, templates/, one directory per software)
    #[arg(long, env = "BUILDYARD_ROOT", global = true)]
    root: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", global = true)]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, build, register and activate a software from its template
    Build {
        /// Software (template) name
        software: String,

        /// Ignore the template's default configuration
        #[arg(long)]
        no_defaults: bool,

        /// Configuration override (repeatable)
        #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_define)]
        defines: Vec<(String, String)>,

        /// Build this branch instead of the template's
        #[arg(long)]
        branch: Option<String>,
    },

    /// Manage build templates
    Template {
        /// Action: list, show, register, init, migrate
        action: String,

        /// Template name (or file for register)
        name: Option<String>,

        /// Template file to register
        #[arg(long)]
        file: Option<std::path::PathBuf>,

        /// Overwrite existing templates on init
        #[arg(long)]
        force: bool,
    },

    /// Get, set or list active builds
    Active {
        /// Action: get, set, list
        action: String,

        /// Software name
        software: Option<String>,

        /// Commit hash (for set)
        commit: Option<String>,
    },

    /// Show build history, newest first
    History {
        /// Limit to one software
        software: Option<String>,

        /// Show at most this many builds
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Manage tracked repositories
    Repo {
        /// Action: list, show, remove
        action: String,

        /// Software name
        software: Option<String>,

        /// Also delete the checkout when removing
        #[arg(long)]
        purge: bool,
    },

    /// Show configuration
    Config {
        /// Action: show, path
        #[arg(default_value = "show")]
        action: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = buildyard::config::load(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.root = root;
    }

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => config.log_level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let ctx = Context {
        config,
        json: cli.json,
    };

    // Execute command
    match cli.command {
        Commands::Build { software, no_defaults, defines, branch } => {
            commands::build::run(&ctx, software, no_defaults, defines, branch)
        }
        Commands::Template { action, name, file, force } => {
            commands::template::run(&ctx, &action, name, file, force)
        }
        Commands::Active { action, software, commit } => {
            commands::active::run(&ctx, &action, software, commit)
        }
        Commands::History { software, limit } => {
            commands::history::run(&ctx, software, limit)
        }
        Commands::Repo { action, software, purge } => {
            commands::repo::run(&ctx, &action, software, purge)
        }
        Commands::Config { action } => {
            commands::config::run(&ctx, &action)
        }
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
