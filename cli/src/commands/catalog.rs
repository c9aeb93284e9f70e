// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Catalog inspection commands
//!
//! Commands: roles, permissions, check

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use storegate_core::application::bootstrap::catalog_from_manifest;
use storegate_core::domain::config::KernelConfigManifest;
use storegate_core::{AccessGuard, BuiltinRole, PermissionCatalog, PermissionId, Principal};

#[derive(Subcommand)]
pub enum CatalogCommand {
    /// List every role with its resolved permissions
    Roles,

    /// List registered permissions and the builtin roles granted each
    Permissions,

    /// Decide whether a principal holds a permission
    Check {
        /// Builtin role of the principal
        #[arg(long, value_parser = parse_role)]
        role: BuiltinRole,

        /// Custom role assigned to the principal (repeatable)
        #[arg(long = "custom-role", value_name = "NAME")]
        custom_roles: Vec<String>,

        /// Individually granted permission (repeatable)
        #[arg(long = "grant", value_name = "PERMISSION")]
        overrides: Vec<PermissionId>,

        /// Permission to check, e.g. inventory:create
        permission: PermissionId,
    },
}

fn parse_role(value: &str) -> Result<BuiltinRole, String> {
    BuiltinRole::from_name(value).ok_or_else(|| format!("unknown role '{value}' (admin, manager, cashier)"))
}

pub async fn handle_command(command: CatalogCommand, config_override: Option<PathBuf>) -> Result<()> {
    let catalog = load_catalog(config_override)?;

    match command {
        CatalogCommand::Roles => roles(&catalog),
        CatalogCommand::Permissions => permissions(&catalog),
        CatalogCommand::Check {
            role,
            custom_roles,
            overrides,
            permission,
        } => check(catalog, role, custom_roles, overrides, permission),
    }
}

fn load_catalog(config_override: Option<PathBuf>) -> Result<PermissionCatalog> {
    let manifest = KernelConfigManifest::load_or_default(config_override).context("Failed to load configuration")?;
    catalog_from_manifest(&manifest).context("Failed to build access catalog")
}

fn roles(catalog: &PermissionCatalog) -> Result<()> {
    for (name, permissions) in catalog.all_roles() {
        let kind = if catalog.is_custom_role(&name) { "custom" } else { "builtin" };
        println!("{} ({})", name.bold(), kind.dimmed());
        for permission in permissions {
            println!("  {}", permission);
        }
    }
    Ok(())
}

fn permissions(catalog: &PermissionCatalog) -> Result<()> {
    let snapshot = catalog.snapshot();
    for id in snapshot.all_permissions() {
        let roles: Vec<&str> = BuiltinRole::ALL
            .into_iter()
            .filter(|role| snapshot.builtin_role_permissions(*role).contains(&id))
            .map(|role| role.as_str())
            .collect();
        println!("{} → [{}]", id.to_string().bold(), roles.join(", "));
    }
    Ok(())
}

fn check(
    catalog: PermissionCatalog,
    role: BuiltinRole,
    custom_roles: Vec<String>,
    overrides: Vec<PermissionId>,
    permission: PermissionId,
) -> Result<()> {
    let mut principal = Principal::new("cli", role);
    for name in custom_roles {
        principal = principal.with_custom_role(name);
    }
    for grant in overrides {
        principal = principal.with_override(grant);
    }

    let guard = AccessGuard::new(Arc::new(catalog));
    match guard.require_permission(&principal, &permission) {
        Ok(()) => println!("{}", format!("✓ granted: {}", permission).green()),
        Err(err) => {
            println!("{}", format!("✗ {}", err).red());
            std::process::exit(2);
        }
    }
    Ok(())
}
