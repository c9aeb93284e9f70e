// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Guard
//!
//! The single coarse-grained authorization boundary. Route handlers call
//! [`AccessGuard::require`] before running business logic, and every
//! `QueryManager` operation calls it before touching storage.
//!
//! A check has no side effect other than one audit record.

use std::sync::Arc;

use crate::application::catalog::PermissionCatalog;
use crate::application::resolver::RoleResolver;
use crate::domain::errors::AccessError;
use crate::domain::permission::PermissionId;
use crate::domain::principal::Principal;
use crate::infrastructure::audit::AccessAuditLogger;

/// How a list of required permissions combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequireMode {
    /// Every listed permission is needed. An empty list is satisfied.
    #[default]
    All,
    /// At least one listed permission is needed. An empty list is denied.
    Any,
}

#[derive(Debug, Clone)]
pub struct AccessGuard {
    resolver: RoleResolver,
    audit: AccessAuditLogger,
}

impl AccessGuard {
    pub fn new(catalog: Arc<PermissionCatalog>) -> Self {
        Self::with_resolver(RoleResolver::new(catalog))
    }

    pub fn with_resolver(resolver: RoleResolver) -> Self {
        Self {
            resolver,
            audit: AccessAuditLogger::new(),
        }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Check `required` against the principal's effective permissions.
    ///
    /// # Errors
    ///
    /// [`AccessError::PermissionDenied`] carrying the principal id and the
    /// full requirement list when the condition is not met.
    pub fn require(
        &self,
        principal: &Principal,
        required: &[PermissionId],
        mode: RequireMode,
    ) -> Result<(), AccessError> {
        let effective = self.resolver.effective_permissions(principal);
        let satisfied = match mode {
            RequireMode::All => required.iter().all(|p| effective.contains(p)),
            RequireMode::Any => required.iter().any(|p| effective.contains(p)),
        };

        if satisfied {
            self.audit.log_granted(&principal.id, required);
            Ok(())
        } else {
            self.audit.log_denied(&principal.id, required);
            Err(AccessError::PermissionDenied {
                principal_id: principal.id.clone(),
                required: required.to_vec(),
            })
        }
    }

    /// Single-permission form of [`AccessGuard::require`].
    pub fn require_permission(
        &self,
        principal: &Principal,
        permission: &PermissionId,
    ) -> Result<(), AccessError> {
        self.require(principal, std::slice::from_ref(permission), RequireMode::All)
    }
}
