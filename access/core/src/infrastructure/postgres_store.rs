// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Resource Store
//!
//! `ResourceStore` backed by a single `resources` table shared by every
//! resource type:
//!
//! ```sql
//! CREATE TABLE resources (
//!     resource_type TEXT   NOT NULL,
//!     id            TEXT   NOT NULL,
//!     version       BIGINT NOT NULL,
//!     body          JSONB  NOT NULL,
//!     PRIMARY KEY (resource_type, id)
//! );
//! ```
//!
//! Entities are stored as their serde JSON form. Every write is a single
//! statement guarded by `version = $expected`, so the optimistic check and the
//! commit are atomic. The `id` column holds the key's text form, which does
//! not sort like the typed key (`"10" < "9"`), so scans decode the resource's
//! rows and order, filter and page them through [`ScanRequest::page`].

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::{Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::marker::PhantomData;
use tracing::debug;

use crate::domain::repository::{EntityStream, ResourceStore, ScanRequest, StoreError, Versioned};
use crate::domain::resource::Resource;
use crate::domain::scope::ScopePredicate;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    resource_type TEXT   NOT NULL,
    id            TEXT   NOT NULL,
    version       BIGINT NOT NULL,
    body          JSONB  NOT NULL,
    PRIMARY KEY (resource_type, id)
)
"#;

/// Open a connection pool.
pub async fn connect(connection_string: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(connection_string)
        .await?;
    Ok(pool)
}

/// Create the `resources` table if it does not exist.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;
    Ok(())
}

pub struct PostgresResourceStore<R> {
    pool: PgPool,
    resource: String,
    _entity: PhantomData<fn() -> R>,
}

impl<R> PostgresResourceStore<R> {
    pub fn new(pool: PgPool, resource: impl Into<String>) -> Self {
        Self {
            pool,
            resource: resource.into(),
            _entity: PhantomData,
        }
    }

    fn to_version(&self, version: u64) -> Result<i64, StoreError> {
        i64::try_from(version).map_err(|_| StoreError::Database(format!("version {} out of range", version)))
    }

    /// Distinguish "gone" from "changed" after a guarded write touched no row.
    async fn missed_write(&self, id: String) -> StoreError {
        let exists = sqlx::query("SELECT 1 FROM resources WHERE resource_type = $1 AND id = $2")
            .bind(&self.resource)
            .bind(&id)
            .fetch_optional(&self.pool)
            .await;

        match exists {
            Ok(Some(_)) => StoreError::VersionConflict {
                resource: self.resource.clone(),
                id,
            },
            Ok(None) => StoreError::NotFound {
                resource: self.resource.clone(),
                id,
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl<R> ResourceStore<R> for PostgresResourceStore<R>
where
    R: Resource + Serialize + DeserializeOwned,
{
    async fn insert(&self, entity: R) -> Result<Versioned<R>, StoreError> {
        let id = entity.id().to_string();
        let body = serde_json::to_value(&entity)?;

        let result = sqlx::query(
            r#"
            INSERT INTO resources (resource_type, id, version, body)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (resource_type, id) DO NOTHING
            "#,
        )
        .bind(&self.resource)
        .bind(&id)
        .bind(body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                resource: self.resource.clone(),
                id,
            });
        }
        debug!(resource = %self.resource, %id, "inserted row");
        Ok(Versioned { entity, version: 1 })
    }

    async fn find_by_id(&self, id: &R::Id) -> Result<Option<Versioned<R>>, StoreError> {
        let row = sqlx::query("SELECT version, body FROM resources WHERE resource_type = $1 AND id = $2")
            .bind(&self.resource)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let version: i64 = row.try_get("version")?;
                let body: serde_json::Value = row.try_get("body")?;
                Ok(Some(Versioned {
                    entity: serde_json::from_value(body)?,
                    version: version as u64,
                }))
            }
            None => Ok(None),
        }
    }

    async fn scan(&self, request: ScanRequest) -> Result<EntityStream<R>, StoreError> {
        let rows: Vec<R> = decode_rows(self.pool.clone(), self.resource.clone(), request.filter.clone())
            .try_collect()
            .await?;
        let page = request.page(rows);
        debug!(resource = %self.resource, rows = page.len(), "scanned");
        Ok(stream::iter(page.into_iter().map(Ok)).boxed())
    }

    async fn update(&self, entity: R, expected_version: u64) -> Result<Versioned<R>, StoreError> {
        let id = entity.id().to_string();
        let body = serde_json::to_value(&entity)?;
        let expected = self.to_version(expected_version)?;

        let result = sqlx::query(
            r#"
            UPDATE resources
            SET body = $4, version = version + 1
            WHERE resource_type = $1 AND id = $2 AND version = $3
            "#,
        )
        .bind(&self.resource)
        .bind(&id)
        .bind(expected)
        .bind(body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write(id).await);
        }
        Ok(Versioned {
            entity,
            version: expected_version + 1,
        })
    }

    async fn delete(&self, id: &R::Id, expected_version: u64) -> Result<(), StoreError> {
        let id = id.to_string();
        let expected = self.to_version(expected_version)?;

        let result = sqlx::query("DELETE FROM resources WHERE resource_type = $1 AND id = $2 AND version = $3")
            .bind(&self.resource)
            .bind(&id)
            .bind(expected)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.missed_write(id).await);
        }
        Ok(())
    }
}

/// Decode every row of `resource` that matches `filter`, in no particular order.
fn decode_rows<R>(
    pool: PgPool,
    resource: String,
    filter: ScopePredicate,
) -> impl Stream<Item = Result<R, StoreError>> + Send + 'static
where
    R: Resource + DeserializeOwned,
{
    try_stream! {
        let mut cursor = sqlx::query("SELECT body FROM resources WHERE resource_type = $1")
            .bind(resource)
            .fetch(&pool);

        while let Some(row) = cursor.try_next().await? {
            let body: serde_json::Value = row.try_get("body")?;
            let entity: R = serde_json::from_value(body)?;
            if filter.matches(&entity) {
                yield entity;
            }
        }
    }
}
