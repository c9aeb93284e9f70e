// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Role Administration
//!
//! Application service behind the `/roles` admin routes: inspect builtin and
//! custom roles, and create, replace or delete custom roles at runtime.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Authorize and apply custom-role changes to the catalog
//! - **Collaborators:**
//!   - Application: AccessGuard, PermissionCatalog
//!   - Infrastructure: RoleAssignmentLookup (who still holds a role)
//!
//! Listing requires `users:read`; create, update and delete require
//! `users:create`, `users:update` and `users:delete` respectively.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::application::catalog::CatalogSnapshot;
use crate::application::guard::AccessGuard;
use crate::domain::errors::{AccessError, CatalogError};
use crate::domain::permission::{BuiltinRole, PermissionId};
use crate::domain::principal::Principal;

pub const USERS_READ: &str = "users:read";
pub const USERS_CREATE: &str = "users:create";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";

/// Counts principals still assigned a custom role, so a role in use is not
/// deleted out from under them.
#[async_trait]
pub trait RoleAssignmentLookup: Send + Sync {
    async fn count_principals_with_role(&self, role: &str) -> anyhow::Result<usize>;
}

/// Lookup for deployments that keep no assignment records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRoleAssignments;

#[async_trait]
impl RoleAssignmentLookup for NoRoleAssignments {
    async fn count_principals_with_role(&self, _role: &str) -> anyhow::Result<usize> {
        Ok(0)
    }
}

/// Fixed assignment counts, keyed by role name.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleAssignments {
    counts: BTreeMap<String, usize>,
}

impl StaticRoleAssignments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, role: impl Into<String>, count: usize) -> Self {
        self.counts.insert(role.into(), count);
        self
    }
}

#[async_trait]
impl RoleAssignmentLookup for StaticRoleAssignments {
    async fn count_principals_with_role(&self, role: &str) -> anyhow::Result<usize> {
        Ok(self.counts.get(role).copied().unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleView {
    pub name: String,
    pub permissions: Vec<PermissionId>,
    pub builtin: bool,
}

#[derive(Debug, Error)]
pub enum RoleAdminError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("role '{0}' already exists")]
    RoleAlreadyExists(String),

    #[error("role '{0}' not found")]
    RoleNotFound(String),

    #[error("builtin role '{0}' cannot be modified")]
    BuiltinRoleImmutable(String),

    #[error("role '{role}' is assigned to {assignments} principal(s)")]
    RoleInUse { role: String, assignments: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("role assignment lookup failed: {0}")]
    Lookup(String),
}

#[derive(Debug, Clone)]
struct AdminPermissions {
    read: PermissionId,
    create: PermissionId,
    update: PermissionId,
    delete: PermissionId,
}

pub struct RoleAdministrationService {
    guard: AccessGuard,
    assignments: Arc<dyn RoleAssignmentLookup>,
    required: AdminPermissions,
}

impl RoleAdministrationService {
    pub fn new(guard: AccessGuard, assignments: Arc<dyn RoleAssignmentLookup>) -> Result<Self, CatalogError> {
        let required = AdminPermissions {
            read: PermissionId::parse(USERS_READ)?,
            create: PermissionId::parse(USERS_CREATE)?,
            update: PermissionId::parse(USERS_UPDATE)?,
            delete: PermissionId::parse(USERS_DELETE)?,
        };
        Ok(Self {
            guard,
            assignments,
            required,
        })
    }

    fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.guard.resolver().snapshot()
    }

    /// Every builtin and custom role with its permissions, sorted by name.
    pub fn list_roles(&self, principal: &Principal) -> Result<Vec<RoleView>, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.read)?;
        Ok(self
            .snapshot()
            .all_roles()
            .into_iter()
            .map(|(name, permissions)| RoleView {
                builtin: BuiltinRole::from_name(&name).is_some(),
                permissions: permissions.into_iter().collect(),
                name,
            })
            .collect())
    }

    pub fn list_permissions(&self, principal: &Principal) -> Result<Vec<PermissionId>, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.read)?;
        Ok(self.snapshot().all_permissions())
    }

    pub fn role_permissions(&self, principal: &Principal, name: &str) -> Result<RoleView, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.read)?;
        let snapshot = self.snapshot();
        view_of(&snapshot, name).ok_or_else(|| RoleAdminError::RoleNotFound(name.to_string()))
    }

    pub fn create_custom_role(
        &self,
        principal: &Principal,
        name: &str,
        permissions: Vec<PermissionId>,
    ) -> Result<RoleView, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.create)?;
        let name = name.trim();

        if !self.guard.resolver().catalog().create_custom_role(name, permissions)? {
            return Err(RoleAdminError::RoleAlreadyExists(name.to_string()));
        }

        info!(role = %name, principal = %principal.id, "custom role created");
        self.custom_view(name)
    }

    pub fn update_custom_role(
        &self,
        principal: &Principal,
        name: &str,
        permissions: Vec<PermissionId>,
    ) -> Result<RoleView, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.update)?;
        let name = name.trim();
        if BuiltinRole::collides_with(name) {
            return Err(RoleAdminError::BuiltinRoleImmutable(name.to_string()));
        }

        if !self.guard.resolver().catalog().replace_custom_role(name, permissions)? {
            return Err(RoleAdminError::RoleNotFound(name.to_string()));
        }

        info!(role = %name, principal = %principal.id, "custom role updated");
        self.custom_view(name)
    }

    /// Delete a custom role that no principal is assigned. Returns the role
    /// as it was just before deletion.
    pub async fn delete_custom_role(&self, principal: &Principal, name: &str) -> Result<RoleView, RoleAdminError> {
        self.guard.require_permission(principal, &self.required.delete)?;
        let name = name.trim();
        if BuiltinRole::collides_with(name) {
            return Err(RoleAdminError::BuiltinRoleImmutable(name.to_string()));
        }
        if !self.snapshot().is_custom_role(name) {
            return Err(RoleAdminError::RoleNotFound(name.to_string()));
        }

        let assignments = self
            .assignments
            .count_principals_with_role(name)
            .await
            .map_err(|e| RoleAdminError::Lookup(format!("{:#}", e)))?;
        if assignments > 0 {
            return Err(RoleAdminError::RoleInUse {
                role: name.to_string(),
                assignments,
            });
        }

        let removed = self.custom_view(name)?;
        if !self.guard.resolver().catalog().unregister_custom_role(name) {
            return Err(RoleAdminError::RoleNotFound(name.to_string()));
        }

        info!(role = %name, principal = %principal.id, "custom role deleted");
        Ok(removed)
    }

    fn custom_view(&self, name: &str) -> Result<RoleView, RoleAdminError> {
        let snapshot = self.snapshot();
        snapshot
            .custom_role_permissions(name)
            .map(|permissions| RoleView {
                name: name.to_string(),
                permissions: permissions.iter().cloned().collect(),
                builtin: false,
            })
            .ok_or_else(|| RoleAdminError::RoleNotFound(name.to_string()))
    }
}

fn view_of(snapshot: &CatalogSnapshot, name: &str) -> Option<RoleView> {
    if let Some(role) = BuiltinRole::from_name(name) {
        return Some(RoleView {
            name: role.as_str().to_string(),
            permissions: snapshot.builtin_role_permissions(role).into_iter().collect(),
            builtin: true,
        });
    }
    snapshot.custom_role_permissions(name).map(|permissions| RoleView {
        name: name.to_string(),
        permissions: permissions.iter().cloned().collect(),
        builtin: false,
    })
}
