// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::application::catalog::{CatalogSnapshot, PermissionCatalog};
use crate::domain::permission::PermissionId;
use crate::domain::principal::Principal;

/// Computes a principal's effective permission set.
///
/// Nothing is cached across calls: custom roles can change between requests,
/// and every answer is taken from the catalog snapshot current at call time.
#[derive(Debug, Clone)]
pub struct RoleResolver {
    catalog: Arc<PermissionCatalog>,
}

impl RoleResolver {
    pub fn new(catalog: Arc<PermissionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Arc<PermissionCatalog> {
        &self.catalog
    }

    /// Current catalog view, for callers that need several answers from one
    /// consistent generation.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.catalog.snapshot()
    }

    pub fn effective_permissions(&self, principal: &Principal) -> BTreeSet<PermissionId> {
        self.catalog.snapshot().effective_permissions(principal)
    }

    pub fn has_permission(&self, principal: &Principal, permission: &PermissionId) -> bool {
        self.effective_permissions(principal).contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::permission::BuiltinRole;

    fn pid(s: &str) -> PermissionId {
        PermissionId::parse(s).unwrap()
    }

    fn catalog() -> Arc<PermissionCatalog> {
        let catalog = PermissionCatalog::new();
        catalog.register("inventory:read", &[BuiltinRole::Manager, BuiltinRole::Cashier]).unwrap();
        catalog.register("inventory:create", &[BuiltinRole::Manager]).unwrap();
        catalog.register("sales:refund", &[BuiltinRole::Manager]).unwrap();
        Arc::new(catalog)
    }

    #[test]
    fn test_union_of_role_custom_roles_and_overrides() {
        let catalog = catalog();
        catalog.register_custom_role("stocker", [pid("inventory:create")]).unwrap();
        let resolver = RoleResolver::new(Arc::clone(&catalog));

        let cashier = Principal::new("c-1", BuiltinRole::Cashier)
            .with_custom_role("stocker")
            .with_override(pid("sales:refund"));

        let effective = resolver.effective_permissions(&cashier);
        assert_eq!(
            effective,
            [pid("inventory:read"), pid("inventory:create"), pid("sales:refund")]
                .into_iter()
                .collect()
        );
    }

    #[test]
    fn test_unregistered_override_is_ignored() {
        let resolver = RoleResolver::new(catalog());
        let cashier = Principal::new("c-1", BuiltinRole::Cashier).with_override(pid("payroll:approve"));
        assert!(!resolver.has_permission(&cashier, &pid("payroll:approve")));
    }

    #[test]
    fn test_superuser_holds_every_registered_permission() {
        let resolver = RoleResolver::new(catalog());
        let root = Principal::new("root", BuiltinRole::Cashier).superuser();
        assert_eq!(resolver.effective_permissions(&root).len(), 3);
        assert!(resolver.has_permission(&root, &pid("sales:refund")));
    }

    #[test]
    fn test_custom_role_changes_are_seen_immediately() {
        let catalog = catalog();
        let resolver = RoleResolver::new(Arc::clone(&catalog));
        let principal = Principal::new("c-2", BuiltinRole::Cashier).with_custom_role("refunds");

        assert!(!resolver.has_permission(&principal, &pid("sales:refund")));
        catalog.register_custom_role("refunds", [pid("sales:refund")]).unwrap();
        assert!(resolver.has_permission(&principal, &pid("sales:refund")));
        catalog.unregister_custom_role("refunds");
        assert!(!resolver.has_permission(&principal, &pid("sales:refund")));
    }
}
