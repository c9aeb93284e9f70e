// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Descriptors
//!
//! A [`ResourceDescriptor`] binds one resource type to the permission required
//! for each of its five operations and to the [`ScopeRule`]s that restrict which
//! rows those permissions reach. Descriptors are registered once in the
//! [`crate::application::catalog::PermissionCatalog`], which verifies every
//! referenced permission exists before the descriptor becomes visible.
//!
//! [`Resource`] is the capability interface a concrete entity type implements
//! so a [`crate::application::query_manager::QueryManager`] can manage it
//! without knowing its schema.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use thiserror::Error;

use super::attribute::{AttributeSource, AttributeValue};
use super::permission::{InvalidPermissionId, PermissionId};
use super::scope::ScopePredicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }
}

/// Permission required for each operation on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPermissions {
    pub create: PermissionId,
    pub read: PermissionId,
    pub update: PermissionId,
    pub delete: PermissionId,
    pub list: PermissionId,
}

impl OperationPermissions {
    /// Conventional mapping `ns:create`, `ns:read`, `ns:update`, `ns:delete`,
    /// with `list` sharing `ns:read`.
    pub fn conventional(namespace: &str) -> Result<Self, InvalidPermissionId> {
        let id = |action: &str| PermissionId::parse(&format!("{}:{}", namespace, action));
        Ok(Self {
            create: id("create")?,
            read: id("read")?,
            update: id("update")?,
            delete: id("delete")?,
            list: id("read")?,
        })
    }

    pub fn get(&self, operation: Operation) -> &PermissionId {
        match operation {
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::List => &self.list,
        }
    }
}

/// Row-level restriction attached to one permission of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeRule {
    pub permission: PermissionId,
    pub predicate: ScopePredicate,
}

impl ScopeRule {
    pub fn new(permission: PermissionId, predicate: ScopePredicate) -> Self {
        Self { permission, predicate }
    }
}

/// What `delete` does to a row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Remove the row from storage.
    #[default]
    Hard,
    /// Set `attribute` to `true` and hide the row from every later operation.
    Soft { attribute: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    pub permissions: OperationPermissions,
    #[serde(default)]
    pub scope_rules: Vec<ScopeRule>,
    /// Attributes that must be present and non-null on create and after
    /// every update.
    #[serde(default)]
    pub required_attributes: Vec<String>,
    #[serde(default)]
    pub deletion: DeletionPolicy,
}

impl ResourceDescriptor {
    pub fn new(name: impl Into<String>, permissions: OperationPermissions) -> Self {
        Self {
            name: name.into(),
            permissions,
            scope_rules: Vec::new(),
            required_attributes: Vec::new(),
            deletion: DeletionPolicy::Hard,
        }
    }

    pub fn with_scope_rule(mut self, rule: ScopeRule) -> Self {
        self.scope_rules.push(rule);
        self
    }

    /// Attach the same predicate to every distinct operation permission.
    pub fn with_scope_for_all(mut self, predicate: ScopePredicate) -> Self {
        let mut seen: Vec<PermissionId> = Vec::new();
        for op in Operation::ALL {
            let permission = self.permissions.get(op).clone();
            if !seen.contains(&permission) {
                seen.push(permission.clone());
                self.scope_rules.push(ScopeRule::new(permission, predicate.clone()));
            }
        }
        self
    }

    pub fn with_required_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.required_attributes.push(attribute.into());
        self
    }

    pub fn with_deletion_policy(mut self, deletion: DeletionPolicy) -> Self {
        self.deletion = deletion;
        self
    }

    pub fn permission(&self, operation: Operation) -> &PermissionId {
        self.permissions.get(operation)
    }

    /// Every permission id this descriptor references.
    pub fn referenced_permissions(&self) -> impl Iterator<Item = &PermissionId> {
        Operation::ALL
            .into_iter()
            .map(move |op| self.permissions.get(op))
            .chain(self.scope_rules.iter().map(|r| &r.permission))
    }

    /// Conjunction of all scope rules bound to the permission that gates
    /// `operation`. `Always` when no rule applies.
    pub fn scope_for(&self, operation: Operation) -> ScopePredicate {
        let permission = self.permission(operation);
        self.scope_rules
            .iter()
            .filter(|rule| &rule.permission == permission)
            .fold(ScopePredicate::Always, |acc, rule| acc.and(rule.predicate.clone()))
    }

    /// Required attributes that are absent or null on `entity`.
    pub fn missing_attributes<E: AttributeSource + ?Sized>(&self, entity: &E) -> Vec<String> {
        self.required_attributes
            .iter()
            .filter(|name| entity.attribute(name).map_or(true, |v| v.is_null()))
            .cloned()
            .collect()
    }
}

/// Rejected attribute write or entity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Capability interface for entities managed by a `QueryManager`.
///
/// The identity accessor gives the primary key (rows are listed in ascending
/// key order), [`AttributeSource`] exposes the attributes scope rules look at,
/// and [`Resource::set_attribute`] is how patches and scope stamping write
/// back.
pub trait Resource: AttributeSource + Clone + Debug + Send + Sync + 'static {
    type Id: Clone + Ord + Debug + Display + Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    /// Replace the primary key with a fresh server-chosen one. Called on
    /// every create, so no caller-supplied key reaches storage.
    fn assign_id(&mut self);

    /// Write one attribute. Identity and unknown attributes are rejected.
    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<(), ValidationError>;

    /// Entity-level invariants checked on create and after every patch.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
