// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory `ResourceStore`, used by tests and single-node deployments
//! without a database. Scans are materialized under the read lock and
//! streamed after it is released.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::repository::{EntityStream, ResourceStore, ScanRequest, SortOrder, StoreError, Versioned};
use crate::domain::resource::Resource;

pub struct InMemoryResourceStore<R: Resource> {
    resource: String,
    rows: Arc<RwLock<BTreeMap<R::Id, Versioned<R>>>>,
}

impl<R: Resource> Clone for InMemoryResourceStore<R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<R: Resource> InMemoryResourceStore<R> {
    /// `resource` names the type in error messages.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            rows: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn not_found(&self, id: &R::Id) -> StoreError {
        StoreError::NotFound {
            resource: self.resource.clone(),
            id: id.to_string(),
        }
    }

    fn conflict(&self, id: &R::Id) -> StoreError {
        StoreError::VersionConflict {
            resource: self.resource.clone(),
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl<R: Resource> ResourceStore<R> for InMemoryResourceStore<R> {
    async fn insert(&self, entity: R) -> Result<Versioned<R>, StoreError> {
        let mut rows = self.rows.write().await;
        let id = entity.id();
        if rows.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                resource: self.resource.clone(),
                id: id.to_string(),
            });
        }
        let stored = Versioned { entity, version: 1 };
        rows.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &R::Id) -> Result<Option<Versioned<R>>, StoreError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn scan(&self, request: ScanRequest) -> Result<EntityStream<R>, StoreError> {
        let rows = self.rows.read().await;
        let matching = rows.values().map(|row| &row.entity).filter(|e| request.filter.matches(*e));

        let page: Vec<R> = match request.order {
            SortOrder::Ascending => matching.skip(request.offset).take(request.limit).cloned().collect(),
            SortOrder::Descending => matching.rev().skip(request.offset).take(request.limit).cloned().collect(),
        };

        Ok(stream::iter(page.into_iter().map(Ok)).boxed())
    }

    async fn update(&self, entity: R, expected_version: u64) -> Result<Versioned<R>, StoreError> {
        let mut rows = self.rows.write().await;
        let id = entity.id();
        let row = rows.get_mut(&id).ok_or_else(|| self.not_found(&id))?;
        if row.version != expected_version {
            return Err(self.conflict(&id));
        }
        row.entity = entity;
        row.version += 1;
        Ok(row.clone())
    }

    async fn delete(&self, id: &R::Id, expected_version: u64) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get(id) {
            None => Err(self.not_found(id)),
            Some(row) if row.version != expected_version => Err(self.conflict(id)),
            Some(_) => {
                rows.remove(id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::Product;
    use crate::domain::scope::ScopePredicate;
    use futures::TryStreamExt;

    fn scan(filter: ScopePredicate, order: SortOrder, offset: usize, limit: usize) -> ScanRequest {
        ScanRequest {
            filter,
            order,
            offset,
            limit,
        }
    }

    #[tokio::test]
    async fn test_versions_advance_and_conflicts_are_detected() {
        let store = InMemoryResourceStore::new("product");
        let stored = store.insert(Product::new("Rye", "RYE-1").in_store(1)).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut changed = stored.entity.clone();
        changed.quantity = 7;
        let updated = store.update(changed.clone(), 1).await.unwrap();
        assert_eq!(updated.version, 2);

        assert!(matches!(
            store.update(changed, 1).await,
            Err(StoreError::VersionConflict { .. })
        ));
        assert!(matches!(
            store.delete(&stored.entity.id, 1).await,
            Err(StoreError::VersionConflict { .. })
        ));
        store.delete(&stored.entity.id, 2).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryResourceStore::new("product");
        let product = Product::new("Rye", "RYE-1");
        store.insert(product.clone()).await.unwrap();
        assert!(matches!(
            store.insert(product).await,
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_scan_filters_orders_and_pages() {
        let store = InMemoryResourceStore::new("product");
        for i in 0..6 {
            let store_id = if i % 2 == 0 { 1 } else { 2 };
            store
                .insert(Product::new(format!("p{i}"), format!("SKU-{i}")).in_store(store_id))
                .await
                .unwrap();
        }

        let all: Vec<Product> = store
            .scan(scan(ScopePredicate::equals("store_id", 1), SortOrder::Ascending, 0, 100))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let page: Vec<Product> = store
            .scan(scan(ScopePredicate::equals("store_id", 1), SortOrder::Descending, 1, 1))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(page, vec![all[1].clone()]);
    }
}
