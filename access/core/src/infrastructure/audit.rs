// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Audit Logger
//!
//! Emits one structured record per authorization decision on the
//! `storegate::audit` tracing target, so deployments can route audit records
//! separately from operational logs with an `EnvFilter` directive such as
//! `storegate::audit=info`.
//!
//! Denials are written at `WARN` with the principal id and every required
//! permission; grants at `DEBUG`.

use tracing::{debug, warn};

use crate::domain::permission::PermissionId;
use crate::domain::principal::PrincipalId;

pub const AUDIT_TARGET: &str = "storegate::audit";

/// Writes authorization decisions to the structured tracing log.
#[derive(Debug, Clone, Default)]
pub struct AccessAuditLogger;

impl AccessAuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn log_granted(&self, principal_id: &PrincipalId, required: &[PermissionId]) {
        debug!(
            target: AUDIT_TARGET,
            principal = %principal_id,
            required = %display_list(required),
            decision = "granted",
            "access granted"
        );
    }

    pub fn log_denied(&self, principal_id: &PrincipalId, required: &[PermissionId]) {
        warn!(
            target: AUDIT_TARGET,
            principal = %principal_id,
            required = %display_list(required),
            decision = "denied",
            "access denied"
        );
    }
}

fn display_list(required: &[PermissionId]) -> String {
    required
        .iter()
        .map(PermissionId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
