// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Catalog bootstrap
//!
//! Builds the process-wide [`PermissionCatalog`] from a
//! [`KernelConfigManifest`]. Any registration error aborts startup.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::catalog::PermissionCatalog;
use crate::domain::config::KernelConfigManifest;
use crate::domain::errors::CatalogError;
use crate::domain::inventory::product_descriptor;
use crate::domain::permission::BuiltinRole;

use BuiltinRole::{Admin, Cashier, Manager};

/// Retail permission set: user administration, inventory, sales and reports.
pub const STANDARD_PERMISSIONS: &[(&str, &[BuiltinRole])] = &[
    ("users:create", &[Admin]),
    ("users:read", &[Admin, Manager]),
    ("users:update", &[Admin]),
    ("users:delete", &[Admin]),
    ("inventory:create", &[Admin, Manager]),
    ("inventory:read", &[Admin, Manager, Cashier]),
    ("inventory:update", &[Admin, Manager]),
    ("inventory:delete", &[Admin, Manager]),
    ("inventory:manage_stock", &[Admin, Manager]),
    ("sales:create", &[Admin, Manager, Cashier]),
    ("sales:read", &[Admin, Manager, Cashier]),
    ("sales:update", &[Admin, Manager]),
    ("sales:complete", &[Admin, Manager, Cashier]),
    ("sales:cancel", &[Admin, Manager, Cashier]),
    ("sales:refund", &[Admin, Manager]),
    ("reports:view", &[Admin, Manager]),
    ("reports:export", &[Admin, Manager]),
];

pub fn register_standard_permissions(catalog: &PermissionCatalog) -> Result<(), CatalogError> {
    for (id, roles) in STANDARD_PERMISSIONS {
        catalog.register(id, roles)?;
    }
    Ok(())
}

/// Register the descriptors of the inventory resources (currently `product`).
pub fn register_inventory_resources(catalog: &PermissionCatalog) -> Result<(), CatalogError> {
    catalog.register_resource_descriptor(product_descriptor()?)?;
    Ok(())
}

/// Standard permissions plus inventory resources, with no custom roles.
pub fn standard_catalog() -> Result<PermissionCatalog, CatalogError> {
    let catalog = PermissionCatalog::new();
    register_standard_permissions(&catalog)?;
    register_inventory_resources(&catalog)?;
    Ok(catalog)
}

/// Build a catalog from a validated manifest.
///
/// Order: standard set (and inventory resources) if enabled, extra
/// permissions, then custom roles, so custom roles may reference either.
pub fn catalog_from_manifest(manifest: &KernelConfigManifest) -> Result<PermissionCatalog> {
    manifest.validate()?;
    let spec = &manifest.spec;
    let catalog = PermissionCatalog::new();

    if spec.include_standard_permissions {
        register_standard_permissions(&catalog).context("Failed to register standard permissions")?;
        register_inventory_resources(&catalog).context("Failed to register inventory resources")?;
    }

    for permission in &spec.permissions {
        catalog
            .register_permission(permission.id.clone(), permission.roles.iter().copied())
            .with_context(|| format!("Failed to register permission '{}'", permission.id))?;
    }

    for role in &spec.custom_roles {
        catalog
            .register_custom_role(&role.name, role.permissions.iter().cloned())
            .with_context(|| format!("Failed to register custom role '{}'", role.name))?;
    }

    let snapshot = catalog.snapshot();
    info!(
        catalog = %manifest.metadata.name,
        permissions = snapshot.all_permissions().len(),
        custom_roles = spec.custom_roles.len(),
        generation = snapshot.generation(),
        "Access catalog ready"
    );
    Ok(catalog)
}
