// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Kernel Errors
//!
//! | Error | Raised by | Boundary mapping |
//! |-------|-----------|------------------|
//! | [`CatalogError`] | registration at bootstrap | fatal, process must not start |
//! | [`AccessError::PermissionDenied`] | `AccessGuard` | 403 |
//! | [`AccessError::NotFound`] | fetch / scope check | 404 |
//! | [`AccessError::ValidationFail`] | mutate | 422 |
//! | [`AccessError::ConflictFail`] | commit | 409 |
//! | [`AccessError::Storage`] | storage collaborator | 500 |
//!
//! `NotFound` is deliberately one variant for "absent" and "outside the
//! caller's scope".

use thiserror::Error;

use super::permission::{InvalidPermissionId, PermissionId};
use super::principal::PrincipalId;
use super::repository::StoreError;
use super::resource::ValidationError;

/// Registry inconsistency detected while registering permissions, roles or
/// resource descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("permission '{0}' is already registered with a different role set")]
    DuplicatePermission(PermissionId),

    #[error("permission '{0}' is not registered")]
    UnknownPermission(PermissionId),

    #[error("role name '{0}' collides with a builtin role")]
    RoleNameCollision(String),

    #[error("role name must not be empty")]
    InvalidRoleName,

    #[error("resource '{0}' is already registered")]
    DuplicateResource(String),

    #[error("resource '{0}' is not registered")]
    UnknownResource(String),

    #[error(transparent)]
    InvalidPermissionId(#[from] InvalidPermissionId),
}

/// Request-time failure of an authorized data-access operation.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("principal '{principal_id}' lacks required permission(s): {}", join(.required))]
    PermissionDenied {
        principal_id: PrincipalId,
        required: Vec<PermissionId>,
    },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("validation failed: {0}")]
    ValidationFail(String),

    #[error("{resource} '{id}' was modified concurrently; refetch and retry")]
    ConflictFail { resource: String, id: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl AccessError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, AccessError::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AccessError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AccessError::ConflictFail { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AccessError::ValidationFail(_))
    }
}

impl From<ValidationError> for AccessError {
    fn from(err: ValidationError) -> Self {
        AccessError::ValidationFail(err.to_string())
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => AccessError::NotFound { resource, id },
            StoreError::VersionConflict { resource, id } | StoreError::AlreadyExists { resource, id } => {
                AccessError::ConflictFail { resource, id }
            }
            other => AccessError::Storage(other.to_string()),
        }
    }
}

fn join(required: &[PermissionId]) -> String {
    required
        .iter()
        .map(PermissionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
