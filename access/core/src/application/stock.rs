// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Stock Management
//!
//! Stock operations layered on the product [`QueryManager`]. Each call first
//! requires `inventory:manage_stock` and then goes through the manager, so
//! the row is still gated by the product permissions and the caller's store
//! scope.

use tracing::{info, warn};

use crate::application::query_manager::{ListQuery, QueryManager};
use crate::domain::attribute::{AttributeValue, Attributes};
use crate::domain::errors::{AccessError, CatalogError};
use crate::domain::inventory::{Product, ProductId, IS_LOW_STOCK};
use crate::domain::permission::PermissionId;
use crate::domain::principal::Principal;
use crate::domain::repository::Versioned;
use crate::domain::scope::ScopePredicate;

pub const INVENTORY_MANAGE_STOCK: &str = "inventory:manage_stock";

#[derive(Clone)]
pub struct StockService {
    products: QueryManager<Product>,
    manage_stock: PermissionId,
}

impl StockService {
    /// # Errors
    ///
    /// [`CatalogError::UnknownPermission`] if `inventory:manage_stock` is not
    /// registered in the catalog behind `products`.
    pub fn new(products: QueryManager<Product>) -> Result<Self, CatalogError> {
        let manage_stock = PermissionId::parse(INVENTORY_MANAGE_STOCK)?;
        if !products.guard().resolver().snapshot().contains_permission(&manage_stock) {
            return Err(CatalogError::UnknownPermission(manage_stock));
        }
        Ok(Self { products, manage_stock })
    }

    /// Add `delta` (negative to remove) to the product's quantity.
    ///
    /// The read and the write share one version token, so a concurrent
    /// adjustment fails with `ConflictFail` instead of being lost.
    pub async fn adjust_stock(
        &self,
        principal: &Principal,
        id: &ProductId,
        delta: i64,
    ) -> Result<Versioned<Product>, AccessError> {
        self.products.guard().require_permission(principal, &self.manage_stock)?;

        let current = self.products.get_versioned(principal, id).await?;
        let quantity = current
            .entity
            .quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| AccessError::ValidationFail("cannot reduce stock below zero".to_string()))?;

        let patch: Attributes = [("quantity".to_string(), AttributeValue::Int(quantity))]
            .into_iter()
            .collect();
        let updated = self
            .products
            .update_versioned(principal, id, current.version, patch)
            .await?;

        info!(product = %id, delta, quantity, principal = %principal.id, "stock adjusted");
        if updated.entity.is_low_stock() {
            warn!(
                product = %id,
                name = %updated.entity.name,
                quantity,
                reorder_level = updated.entity.reorder_level,
                "product at or below reorder level"
            );
        }
        Ok(updated)
    }

    /// Products in the caller's scope whose quantity is at or below their
    /// reorder level.
    pub async fn low_stock(&self, principal: &Principal, query: ListQuery) -> Result<Vec<Product>, AccessError> {
        self.products.guard().require_permission(principal, &self.manage_stock)?;
        let filter = query.filter.clone().and(ScopePredicate::equals(IS_LOW_STOCK, true));
        self.products.list_all(principal, query.with_filter(filter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::bootstrap::standard_catalog;
    use crate::application::guard::AccessGuard;
    use crate::domain::inventory::{PRODUCT_RESOURCE, STORE_ID};
    use crate::domain::permission::BuiltinRole;
    use crate::infrastructure::in_memory_store::InMemoryResourceStore;
    use std::sync::Arc;

    fn stock() -> StockService {
        let catalog = Arc::new(standard_catalog().unwrap());
        let store: InMemoryResourceStore<Product> = InMemoryResourceStore::new(PRODUCT_RESOURCE);
        let products = QueryManager::new(AccessGuard::new(catalog), Arc::new(store), PRODUCT_RESOURCE).unwrap();
        StockService::new(products).unwrap()
    }

    fn manager(store_id: i64) -> Principal {
        Principal::new(format!("m{store_id}"), BuiltinRole::Manager).with_attribute(STORE_ID, store_id)
    }

    #[tokio::test]
    async fn test_adjust_stock_applies_delta() {
        let stock = stock();
        let m1 = manager(1);
        let created = stock
            .products
            .create(&m1, Product::new("Rye", "RYE-1").with_quantity(20))
            .await
            .unwrap();

        let updated = stock.adjust_stock(&m1, &created.id, -15).await.unwrap();
        assert_eq!(updated.entity.quantity, 5);
        assert_eq!(updated.version, 2);

        let err = stock.adjust_stock(&m1, &created.id, -6).await.unwrap_err();
        assert!(err.is_validation(), "{err:?}");
        assert_eq!(stock.products.get(&m1, &created.id).await.unwrap().quantity, 5);
    }

    #[tokio::test]
    async fn test_adjust_stock_requires_manage_stock_and_scope() {
        let stock = stock();
        let created = stock
            .products
            .create(&manager(1), Product::new("Rye", "RYE-1").with_quantity(20))
            .await
            .unwrap();

        let cashier = Principal::new("c1", BuiltinRole::Cashier).with_attribute(STORE_ID, 1);
        let err = stock.adjust_stock(&cashier, &created.id, 1).await.unwrap_err();
        assert!(err.is_permission_denied());

        let err = stock.adjust_stock(&manager(2), &created.id, 1).await.unwrap_err();
        assert!(err.is_not_found());

        let stocker = cashier.with_override(PermissionId::parse("inventory:manage_stock").unwrap());
        let err = stock.adjust_stock(&stocker, &created.id, 1).await.unwrap_err();
        // manage_stock alone does not grant the row update
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn test_low_stock_lists_only_scoped_products_under_reorder_level() {
        let stock = stock();
        let m1 = manager(1);
        for (sku, quantity) in [("A-1", 3), ("A-2", 50), ("A-3", 10)] {
            stock
                .products
                .create(&m1, Product::new("p", sku).with_quantity(quantity))
                .await
                .unwrap();
        }
        stock
            .products
            .create(&manager(2), Product::new("p", "B-1").with_quantity(0))
            .await
            .unwrap();

        let mut low: Vec<String> = stock
            .low_stock(&m1, ListQuery::new())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.sku)
            .collect();
        low.sort();
        assert_eq!(low, vec!["A-1".to_string(), "A-3".to_string()]);

        let cashier = Principal::new("c1", BuiltinRole::Cashier).with_attribute(STORE_ID, 1);
        assert!(stock.low_stock(&cashier, ListQuery::new()).await.unwrap_err().is_permission_denied());
    }
}
