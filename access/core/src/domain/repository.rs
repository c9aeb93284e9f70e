// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource Store Interface
//!
//! Persistence contract consumed by the
//! [`crate::application::query_manager::QueryManager`]. One store instance per
//! resource type; the trait is defined here and implemented in
//! `crate::infrastructure`.
//!
//! | Implementation | Backing |
//! |----------------|---------|
//! | `InMemoryResourceStore` | `BTreeMap` behind a tokio `RwLock` |
//! | `PostgresResourceStore` | `resources` table, JSONB bodies |
//!
//! ## Optimistic Concurrency
//!
//! Every stored row carries a monotonically increasing `version`. Writes name
//! the version they were computed from and fail with
//! [`StoreError::VersionConflict`] if another writer committed in between. The
//! store never enforces scope; it only applies the bound filter it is given.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use super::resource::Resource;
use super::scope::ScopePredicate;

/// An entity together with its optimistic-concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<R> {
    pub entity: R,
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Primary key ascending.
    #[default]
    Ascending,
    Descending,
}

/// Bounded scan over one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Bound predicate (literal operands only).
    pub filter: ScopePredicate,
    pub order: SortOrder,
    /// Matching rows to skip before the first yielded row.
    pub offset: usize,
    /// Maximum rows to yield.
    pub limit: usize,
}

impl ScanRequest {
    /// Apply the request to unordered rows: filter, order by the typed
    /// primary key, then cut the `offset`/`limit` window. For stores whose
    /// native ordering differs from `R::Id: Ord`.
    pub fn page<R: Resource>(&self, rows: impl IntoIterator<Item = R>) -> Vec<R> {
        let mut matching: Vec<R> = rows.into_iter().filter(|e| self.filter.matches(e)).collect();
        matching.sort_by(|a, b| a.id().cmp(&b.id()));
        if self.order == SortOrder::Descending {
            matching.reverse();
        }
        matching.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Lazy, finite sequence of matching entities.
pub type EntityStream<R> = BoxStream<'static, Result<R, StoreError>>;

#[async_trait]
pub trait ResourceStore<R: Resource>: Send + Sync {
    /// Persist a new entity at version 1.
    async fn insert(&self, entity: R) -> Result<Versioned<R>, StoreError>;

    async fn find_by_id(&self, id: &R::Id) -> Result<Option<Versioned<R>>, StoreError>;

    /// Stream rows matching `request.filter` in key order, honoring
    /// `offset`/`limit`.
    async fn scan(&self, request: ScanRequest) -> Result<EntityStream<R>, StoreError>;

    /// Replace the row if its current version equals `expected_version`.
    async fn update(&self, entity: R, expected_version: u64) -> Result<Versioned<R>, StoreError>;

    /// Remove the row if its current version equals `expected_version`.
    async fn delete(&self, id: &R::Id, expected_version: u64) -> Result<(), StoreError>;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    #[error("{resource} '{id}' already exists")]
    AlreadyExists { resource: String, id: String },

    #[error("{resource} '{id}' version conflict")]
    VersionConflict { resource: String, id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
