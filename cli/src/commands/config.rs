// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Catalog manifest commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use storegate_core::domain::config::KernelConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective manifest
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate a manifest and build the catalog from it
    Validate {
        /// Path to manifest (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a sample manifest
    Generate {
        /// Output path (default: ./storegate-config.yaml)
        #[arg(short, long, default_value = "./storegate-config.yaml")]
        output: PathBuf,

        /// Include example permissions and custom roles
        #[arg(long = "with-examples")]
        with_examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, with_examples } => generate(output, with_examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config =
        KernelConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. STOREGATE_CONFIG_PATH: {}",
            std::env::var("STOREGATE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./storegate-config.yaml");
        println!("  4. ~/.storegate/config.yaml");
        println!("  5. /etc/storegate/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();
    println!("  Name: {}", config.metadata.name);
    if let Some(version) = &config.metadata.version {
        println!("  Version: {}", version);
    }
    println!(
        "  Standard permissions: {}",
        if config.spec.include_standard_permissions { "included" } else { "excluded" }
    );
    println!();

    println!("{}", "Extra permissions:".bold());
    if config.spec.permissions.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for permission in &config.spec.permissions {
        let roles: Vec<&str> = permission.roles.iter().map(|r| r.as_str()).collect();
        println!("  {} → [{}]", permission.id.to_string().bold(), roles.join(", "));
    }
    println!();

    println!("{}", "Custom roles:".bold());
    if config.spec.custom_roles.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for role in &config.spec.custom_roles {
        println!("  {} ({} permissions)", role.name.bold(), role.permissions.len());
    }
    println!();

    println!("{}", "Pagination:".bold());
    println!("  Default page size: {}", config.spec.pagination.default_page_size);
    println!("  Max page size: {}", config.spec.pagination.max_page_size);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = KernelConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    let catalog = storegate_core::application::bootstrap::catalog_from_manifest(&config)
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    println!(
        "  {} permissions, {} roles",
        catalog.all_permissions().len(),
        catalog.all_roles().len()
    );

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}
