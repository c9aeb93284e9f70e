// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Principal
//!
//! The authenticated caller as handed to the kernel by the authentication
//! collaborator. A `Principal` is built once per request and never mutated
//! while that request is in flight; the builder methods below consume `self`
//! and are meant for that construction step only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::attribute::{AttributeSource, AttributeValue, Attributes};
use super::permission::{BuiltinRole, PermissionId};

/// Opaque identifier issued by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub role: BuiltinRole,
    /// Names of custom roles assigned to this principal. Names that no longer
    /// resolve in the catalog contribute nothing.
    #[serde(default)]
    pub custom_roles: BTreeSet<String>,
    /// Permissions granted directly, on top of any role.
    #[serde(default)]
    pub overrides: BTreeSet<PermissionId>,
    /// Scope attributes such as `store_id`.
    #[serde(default)]
    pub attributes: Attributes,
    /// Holds every registered permission and bypasses scope rules.
    #[serde(default)]
    pub is_superuser: bool,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: BuiltinRole) -> Self {
        Self {
            id: PrincipalId::new(id),
            role,
            custom_roles: BTreeSet::new(),
            overrides: BTreeSet::new(),
            attributes: Attributes::new(),
            is_superuser: false,
        }
    }

    pub fn with_custom_role(mut self, name: impl Into<String>) -> Self {
        self.custom_roles.insert(name.into());
        self
    }

    pub fn with_override(mut self, permission: PermissionId) -> Self {
        self.overrides.insert(permission);
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }
}

impl AttributeSource for Principal {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).cloned()
    }
}
