// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permission Value Objects
//!
//! A [`PermissionId`] is a flat `"resource:action"` token. Identifiers are
//! validated on construction and carry no implicit hierarchy: `inventory:read`
//! does not imply `inventory:read_supplier`, and there is no wildcard form.
//!
//! ## Identifier Grammar
//!
//! ```text
//! permission := segment ":" segment
//! segment    := [a-z0-9_]+
//! ```
//!
//! [`BuiltinRole`] enumerates the fixed roles known at compile time. Runtime
//! roles (custom roles) live in [`crate::application::catalog::PermissionCatalog`]
//! under their own namespace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected permission identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission id '{value}': {reason}")]
pub struct InvalidPermissionId {
    pub value: String,
    pub reason: &'static str,
}

/// Validated `"resource:action"` permission identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionId(String);

impl PermissionId {
    /// Parse and validate an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPermissionId`] when the value is not exactly two
    /// non-empty segments of `[a-z0-9_]` joined by a single `:`.
    pub fn parse(value: &str) -> Result<Self, InvalidPermissionId> {
        let invalid = |reason| InvalidPermissionId {
            value: value.to_string(),
            reason,
        };

        let (resource, action) = value
            .split_once(':')
            .ok_or_else(|| invalid("expected 'resource:action'"))?;

        if resource.is_empty() || action.is_empty() {
            return Err(invalid("resource and action must be non-empty"));
        }
        if action.contains(':') {
            return Err(invalid("only one ':' separator is allowed"));
        }
        if !resource.chars().chain(action.chars()).all(is_segment_char) {
            return Err(invalid("segments may only contain [a-z0-9_]"));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource half of the identifier (`inventory` in `inventory:read`).
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or(self.0.as_str())
    }

    /// Action half of the identifier (`read` in `inventory:read`).
    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or("")
    }
}

fn is_segment_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

impl FromStr for PermissionId {
    type Err = InvalidPermissionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PermissionId {
    type Error = InvalidPermissionId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PermissionId> for String {
    fn from(id: PermissionId) -> Self {
        id.0
    }
}

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed roles assigned to principals by the authentication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinRole {
    /// Implicitly granted every registered permission.
    Admin,
    Manager,
    Cashier,
}

impl BuiltinRole {
    pub const ALL: [BuiltinRole; 3] = [BuiltinRole::Admin, BuiltinRole::Manager, BuiltinRole::Cashier];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinRole::Admin => "admin",
            BuiltinRole::Manager => "manager",
            BuiltinRole::Cashier => "cashier",
        }
    }

    /// Exact-match lookup of a builtin role name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Case-insensitive check used to keep custom role names out of the
    /// builtin namespace.
    pub fn collides_with(name: &str) -> bool {
        Self::ALL
            .iter()
            .any(|role| role.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for BuiltinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered permission and the builtin roles it is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub roles: BTreeSet<BuiltinRole>,
}
