// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # StoreGate CLI
//!
//! The `storegate` binary inspects access catalogs and serves the access
//! kernel over HTTP.
//!
//! ## Commands
//!
//! - `storegate config show|validate|generate` - Catalog manifest management
//! - `storegate catalog roles|permissions|check` - Inspect the resolved catalog
//! - `storegate serve` - Run the role administration and product API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod server;

use commands::{CatalogCommand, ConfigCommand};

/// StoreGate - access control for the retail back office
#[derive(Parser)]
#[command(name = "storegate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the access catalog manifest (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "STOREGATE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "STOREGATE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Catalog manifest management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Inspect roles and permissions
    #[command(name = "catalog")]
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },

    /// Serve the HTTP API
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        options: server::ServeOptions,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Catalog { command }) => {
            commands::catalog::handle_command(command, cli.config).await
        }
        Some(Commands::Serve { options }) => server::serve(options, cli.config).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
