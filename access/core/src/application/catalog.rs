// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Permission Catalog
//!
//! Process-wide registry of permissions, builtin-role bindings, custom roles
//! and resource descriptors. Constructed once at bootstrap and shared by
//! `Arc` handle with every component that authorizes.
//!
//! ## Concurrency
//!
//! ```text
//! readers ──► tables.read() ──► Arc<CatalogSnapshot> (clone, lock released)
//! writer  ──► writer.lock() ──► clone snapshot ──► mutate copy ──► tables.write() swap
//! ```
//!
//! Readers only hold the read lock long enough to clone an `Arc`, and every
//! snapshot is immutable, so a reader never observes a half-applied role
//! change. Writers are serialized by `writer`; the swap itself is the only
//! moment the table lock is held for writing.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::CatalogError;
use crate::domain::permission::{BuiltinRole, Permission, PermissionId};
use crate::domain::principal::Principal;
use crate::domain::resource::ResourceDescriptor;

/// Immutable view of the catalog at one generation.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    permissions: BTreeMap<PermissionId, BTreeSet<BuiltinRole>>,
    custom_roles: BTreeMap<String, BTreeSet<PermissionId>>,
    resources: BTreeMap<String, Arc<ResourceDescriptor>>,
    generation: u64,
}

impl CatalogSnapshot {
    /// Incremented by every successful mutation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains_permission(&self, id: &PermissionId) -> bool {
        self.permissions.contains_key(id)
    }

    pub fn permission(&self, id: &PermissionId) -> Option<Permission> {
        self.permissions.get(id).map(|roles| Permission {
            id: id.clone(),
            roles: roles.clone(),
        })
    }

    /// All registered permission ids, sorted.
    pub fn all_permissions(&self) -> Vec<PermissionId> {
        self.permissions.keys().cloned().collect()
    }

    pub fn builtin_role_permissions(&self, role: BuiltinRole) -> BTreeSet<PermissionId> {
        self.permissions
            .iter()
            .filter(|(_, roles)| roles.contains(&role))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn custom_role_permissions(&self, name: &str) -> Option<&BTreeSet<PermissionId>> {
        self.custom_roles.get(name)
    }

    pub fn is_custom_role(&self, name: &str) -> bool {
        self.custom_roles.contains_key(name)
    }

    /// Permissions of a builtin or custom role. Unknown names resolve to the
    /// empty set.
    pub fn resolve_role_permissions(&self, name: &str) -> BTreeSet<PermissionId> {
        match BuiltinRole::from_name(name) {
            Some(role) => self.builtin_role_permissions(role),
            None => self.custom_roles.get(name).cloned().unwrap_or_default(),
        }
    }

    /// Every builtin and custom role with its permissions.
    pub fn all_roles(&self) -> BTreeMap<String, BTreeSet<PermissionId>> {
        let mut roles: BTreeMap<String, BTreeSet<PermissionId>> = BuiltinRole::ALL
            .iter()
            .map(|role| (role.as_str().to_string(), self.builtin_role_permissions(*role)))
            .collect();
        roles.extend(self.custom_roles.iter().map(|(n, p)| (n.clone(), p.clone())));
        roles
    }

    pub fn resource_descriptor(&self, name: &str) -> Option<Arc<ResourceDescriptor>> {
        self.resources.get(name).cloned()
    }

    /// Union of the builtin role's permissions, each resolvable custom role's
    /// permissions and registered overrides. Superusers hold everything.
    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<PermissionId> {
        if principal.is_superuser {
            return self.permissions.keys().cloned().collect();
        }

        let mut effective = self.builtin_role_permissions(principal.role);

        for name in &principal.custom_roles {
            match self.custom_roles.get(name) {
                Some(permissions) => effective.extend(permissions.iter().cloned()),
                None => debug!(principal = %principal.id, role = %name, "custom role not registered; ignoring"),
            }
        }

        for permission in &principal.overrides {
            if self.permissions.contains_key(permission) {
                effective.insert(permission.clone());
            } else {
                debug!(principal = %principal.id, %permission, "override names an unregistered permission; ignoring");
            }
        }

        effective
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleWrite {
    Upsert,
    Create,
    Replace,
}

/// Shared, internally synchronized registry handle.
#[derive(Debug, Default)]
pub struct PermissionCatalog {
    tables: RwLock<Arc<CatalogSnapshot>>,
    writer: Mutex<()>,
}

impl PermissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current immutable view. Cheap; never waits on a writer's mutation
    /// work, only on the pointer swap.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.tables.read())
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().generation
    }

    /// Copy-on-write mutation. `apply` returns whether it changed anything;
    /// unchanged copies are discarded without bumping the generation.
    fn mutate<F>(&self, apply: F) -> Result<bool, CatalogError>
    where
        F: FnOnce(&mut CatalogSnapshot) -> Result<bool, CatalogError>,
    {
        let _writer = self.writer.lock();
        let mut next = CatalogSnapshot::clone(&self.snapshot());
        if !apply(&mut next)? {
            return Ok(false);
        }
        next.generation += 1;
        *self.tables.write() = Arc::new(next);
        Ok(true)
    }

    /// Register `id` for `roles` (`admin` is always added).
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicatePermission`] if `id` is already registered
    /// with a different role set. Identical re-registration is a no-op.
    pub fn register_permission(
        &self,
        id: PermissionId,
        roles: impl IntoIterator<Item = BuiltinRole>,
    ) -> Result<(), CatalogError> {
        let mut roles: BTreeSet<BuiltinRole> = roles.into_iter().collect();
        roles.insert(BuiltinRole::Admin);

        let changed = self.mutate(|tables| match tables.permissions.get(&id) {
            Some(existing) if *existing == roles => Ok(false),
            Some(_) => Err(CatalogError::DuplicatePermission(id.clone())),
            None => {
                tables.permissions.insert(id.clone(), roles.clone());
                Ok(true)
            }
        })?;

        if changed {
            debug!(permission = %id, ?roles, "registered permission");
        }
        Ok(())
    }

    /// Parse and register in one step. Returns the parsed id.
    pub fn register(&self, id: &str, roles: &[BuiltinRole]) -> Result<PermissionId, CatalogError> {
        let id = PermissionId::parse(id)?;
        self.register_permission(id.clone(), roles.iter().copied())?;
        Ok(id)
    }

    /// Create or replace a custom role.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::InvalidRoleName`] for an empty name
    /// - [`CatalogError::RoleNameCollision`] if `name` is a builtin role name
    /// - [`CatalogError::UnknownPermission`] for the first unregistered id
    pub fn register_custom_role(
        &self,
        name: &str,
        permission_ids: impl IntoIterator<Item = PermissionId>,
    ) -> Result<(), CatalogError> {
        self.write_custom_role(name, permission_ids, RoleWrite::Upsert)
            .map(|_| ())
    }

    /// Like [`PermissionCatalog::register_custom_role`], but only if no custom
    /// role of that name exists. Returns `false` (and changes nothing) if one
    /// does.
    pub fn create_custom_role(
        &self,
        name: &str,
        permission_ids: impl IntoIterator<Item = PermissionId>,
    ) -> Result<bool, CatalogError> {
        self.write_custom_role(name, permission_ids, RoleWrite::Create)
    }

    /// Like [`PermissionCatalog::register_custom_role`], but only if the custom
    /// role already exists. Returns `false` (and changes nothing) if not.
    pub fn replace_custom_role(
        &self,
        name: &str,
        permission_ids: impl IntoIterator<Item = PermissionId>,
    ) -> Result<bool, CatalogError> {
        self.write_custom_role(name, permission_ids, RoleWrite::Replace)
    }

    fn write_custom_role(
        &self,
        name: &str,
        permission_ids: impl IntoIterator<Item = PermissionId>,
        mode: RoleWrite,
    ) -> Result<bool, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidRoleName);
        }
        if BuiltinRole::collides_with(name) {
            return Err(CatalogError::RoleNameCollision(name.to_string()));
        }
        let permissions: BTreeSet<PermissionId> = permission_ids.into_iter().collect();

        let mut accepted = true;
        let changed = self.mutate(|tables| {
            let exists = tables.custom_roles.contains_key(name);
            if (mode == RoleWrite::Create && exists) || (mode == RoleWrite::Replace && !exists) {
                accepted = false;
                return Ok(false);
            }
            if let Some(unknown) = permissions.iter().find(|p| !tables.permissions.contains_key(*p)) {
                return Err(CatalogError::UnknownPermission(unknown.clone()));
            }
            if tables.custom_roles.get(name) == Some(&permissions) {
                return Ok(false);
            }
            tables.custom_roles.insert(name.to_string(), permissions.clone());
            Ok(true)
        })?;

        if changed {
            info!(role = %name, permissions = permissions.len(), "registered custom role");
        }
        Ok(accepted)
    }

    /// Remove a custom role. Returns `false` if it was not registered.
    /// Principals still naming it simply stop receiving its permissions.
    pub fn unregister_custom_role(&self, name: &str) -> bool {
        let name = name.trim();
        let removed = self
            .mutate(|tables| Ok(tables.custom_roles.remove(name).is_some()))
            .unwrap_or(false);
        if removed {
            info!(role = %name, "unregistered custom role");
        }
        removed
    }

    /// Register a resource descriptor after checking every permission it
    /// references.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::UnknownPermission`] for any unregistered reference
    /// - [`CatalogError::DuplicateResource`] if the name is taken
    pub fn register_resource_descriptor(
        &self,
        descriptor: ResourceDescriptor,
    ) -> Result<Arc<ResourceDescriptor>, CatalogError> {
        let descriptor = Arc::new(descriptor);
        self.mutate(|tables| {
            if let Some(unknown) = descriptor
                .referenced_permissions()
                .find(|p| !tables.permissions.contains_key(*p))
            {
                return Err(CatalogError::UnknownPermission(unknown.clone()));
            }
            if tables.resources.contains_key(&descriptor.name) {
                return Err(CatalogError::DuplicateResource(descriptor.name.clone()));
            }
            tables
                .resources
                .insert(descriptor.name.clone(), Arc::clone(&descriptor));
            Ok(true)
        })?;

        info!(resource = %descriptor.name, rules = descriptor.scope_rules.len(), "registered resource descriptor");
        Ok(descriptor)
    }

    pub fn resolve_role_permissions(&self, name: &str) -> BTreeSet<PermissionId> {
        self.snapshot().resolve_role_permissions(name)
    }

    pub fn all_permissions(&self) -> Vec<PermissionId> {
        self.snapshot().all_permissions()
    }

    pub fn all_roles(&self) -> BTreeMap<String, BTreeSet<PermissionId>> {
        self.snapshot().all_roles()
    }

    pub fn is_custom_role(&self, name: &str) -> bool {
        self.snapshot().is_custom_role(name)
    }

    pub fn contains_permission(&self, id: &PermissionId) -> bool {
        self.snapshot().contains_permission(id)
    }

    pub fn resource_descriptor(&self, name: &str) -> Option<Arc<ResourceDescriptor>> {
        self.snapshot().resource_descriptor(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::{OperationPermissions, ScopeRule};
    use crate::domain::scope::ScopePredicate;

    fn pid(s: &str) -> PermissionId {
        PermissionId::parse(s).unwrap()
    }

    #[test]
    fn test_register_permission_is_idempotent() {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[BuiltinRole::Manager]).unwrap();
        let generation = catalog.generation();

        catalog.register("inventory:read", &[BuiltinRole::Manager]).unwrap();
        // admin is implied, so spelling it out is the same role set
        catalog
            .register("inventory:read", &[BuiltinRole::Manager, BuiltinRole::Admin])
            .unwrap();
        assert_eq!(catalog.generation(), generation);

        let err = catalog.register("inventory:read", &[BuiltinRole::Cashier]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicatePermission(pid("inventory:read")));
    }

    #[test]
    fn test_admin_holds_every_permission() {
        let catalog = PermissionCatalog::new();
        catalog.register("users:delete", &[]).unwrap();
        catalog.register("sales:read", &[BuiltinRole::Cashier]).unwrap();

        let admin = catalog.resolve_role_permissions("admin");
        assert!(admin.contains(&pid("users:delete")));
        assert!(admin.contains(&pid("sales:read")));
        assert!(catalog.resolve_role_permissions("manager").is_empty());
        assert!(catalog.resolve_role_permissions("nobody").is_empty());
    }

    #[test]
    fn test_custom_role_validation() {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[]).unwrap();

        assert_eq!(
            catalog.register_custom_role("Manager", [pid("inventory:read")]),
            Err(CatalogError::RoleNameCollision("Manager".to_string()))
        );
        assert_eq!(
            catalog.register_custom_role("stocker", [pid("inventory:create")]),
            Err(CatalogError::UnknownPermission(pid("inventory:create")))
        );
        assert_eq!(
            catalog.register_custom_role("  ", [pid("inventory:read")]),
            Err(CatalogError::InvalidRoleName)
        );
        assert!(!catalog.is_custom_role("stocker"));
    }

    #[test]
    fn test_create_and_replace_only_custom_role_writes() {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[]).unwrap();
        catalog.register("inventory:create", &[]).unwrap();

        assert!(!catalog.replace_custom_role("stocker", [pid("inventory:read")]).unwrap());
        assert!(!catalog.is_custom_role("stocker"));

        assert!(catalog.create_custom_role("stocker", [pid("inventory:read")]).unwrap());
        assert!(!catalog.create_custom_role("stocker", [pid("inventory:create")]).unwrap());
        assert_eq!(catalog.resolve_role_permissions("stocker").len(), 1);

        assert!(catalog.replace_custom_role("stocker", [pid("inventory:create")]).unwrap());
        assert!(catalog.resolve_role_permissions("stocker").contains(&pid("inventory:create")));
    }

    #[test]
    fn test_unregister_custom_role_drops_contribution() {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[]).unwrap();
        catalog.register_custom_role("stocker", [pid("inventory:read")]).unwrap();

        let principal = Principal::new("u-1", BuiltinRole::Cashier).with_custom_role("stocker");
        assert!(catalog.snapshot().effective_permissions(&principal).contains(&pid("inventory:read")));

        assert!(catalog.unregister_custom_role("stocker"));
        assert!(!catalog.unregister_custom_role("stocker"));
        assert!(catalog.snapshot().effective_permissions(&principal).is_empty());
    }

    #[test]
    fn test_unregister_matches_the_trimmed_registration() {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[]).unwrap();
        catalog.register_custom_role(" stocker ", [pid("inventory:read")]).unwrap();
        assert!(catalog.is_custom_role("stocker"));

        assert!(catalog.unregister_custom_role(" stocker "));
        assert!(!catalog.is_custom_role("stocker"));
    }

    #[test]
    fn test_all_roles_lists_builtin_and_custom() {
        let catalog = PermissionCatalog::new();
        catalog.register("reports:view", &[BuiltinRole::Manager]).unwrap();
        catalog.register_custom_role("auditor", [pid("reports:view")]).unwrap();

        let roles = catalog.all_roles();
        assert_eq!(roles.len(), 4);
        assert!(roles["manager"].contains(&pid("reports:view")));
        assert!(roles["cashier"].is_empty());
        assert!(roles["auditor"].contains(&pid("reports:view")));
    }

    #[test]
    fn test_resource_descriptor_references_are_checked() {
        let catalog = PermissionCatalog::new();
        for action in ["create", "read", "update", "delete"] {
            catalog.register(&format!("inventory:{}", action), &[BuiltinRole::Manager]).unwrap();
        }

        let descriptor = ResourceDescriptor::new("product", OperationPermissions::conventional("inventory").unwrap())
            .with_scope_rule(ScopeRule::new(pid("inventory:audit"), ScopePredicate::Always));
        assert_eq!(
            catalog.register_resource_descriptor(descriptor).unwrap_err(),
            CatalogError::UnknownPermission(pid("inventory:audit"))
        );

        let descriptor = ResourceDescriptor::new("product", OperationPermissions::conventional("inventory").unwrap());
        catalog.register_resource_descriptor(descriptor.clone()).unwrap();
        assert!(catalog.resource_descriptor("product").is_some());
        assert_eq!(
            catalog.register_resource_descriptor(descriptor).unwrap_err(),
            CatalogError::DuplicateResource("product".to_string())
        );
    }

    #[test]
    fn test_readers_never_observe_partial_custom_role() {
        let catalog = Arc::new(PermissionCatalog::new());
        let perms: Vec<PermissionId> = (0..32)
            .map(|i| catalog.register(&format!("bulk:p{}", i), &[]).unwrap())
            .collect();

        let writer = {
            let catalog = Arc::clone(&catalog);
            let perms = perms.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    catalog.register_custom_role("bulk", perms.clone()).unwrap();
                    catalog.unregister_custom_role("bulk");
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || {
                    for _ in 0..2_000 {
                        let size = catalog.resolve_role_permissions("bulk").len();
                        assert!(size == 0 || size == 32, "observed partial role of size {size}");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
