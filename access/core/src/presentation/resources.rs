// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Resource HTTP API
//!
//! Generic CRUD routes over one [`QueryManager`], meant to be nested under
//! the resource's path (e.g. `/products`):
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/` | list (`offset`, `limit`, `order` query params) |
//! | GET | `/{id}` | get, with version token |
//! | POST | `/` | create |
//! | PATCH | `/{id}` | update; `version` in the body makes it conditional |
//! | DELETE | `/{id}` | delete |
//!
//! A malformed id is answered like an unknown one.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::application::query_manager::{ListQuery, QueryManager};
use crate::domain::attribute::Attributes;
use crate::domain::errors::AccessError;
use crate::domain::principal::Principal;
use crate::domain::repository::{SortOrder, Versioned};
use crate::domain::resource::Resource;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct PatchRequest {
    /// Version token from a previous read.
    pub version: Option<u64>,
    pub attributes: Attributes,
}

pub fn resource_router<R>(manager: QueryManager<R>) -> Router
where
    R: Resource + Serialize + DeserializeOwned,
    R::Id: FromStr,
{
    Router::new()
        .route("/", get(list::<R>).post(create::<R>))
        .route(
            "/{id}",
            get(fetch::<R>).patch(update::<R>).delete(remove::<R>),
        )
        .with_state(Arc::new(manager))
}

fn parse_id<R: Resource>(manager: &QueryManager<R>, raw: &str) -> Result<R::Id, AccessError>
where
    R::Id: FromStr,
{
    raw.parse().map_err(|_| AccessError::NotFound {
        resource: manager.descriptor().name.clone(),
        id: raw.to_string(),
    })
}

async fn list<R>(
    State(manager): State<Arc<QueryManager<R>>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<R>>, AccessError>
where
    R: Resource + Serialize,
{
    let mut query = ListQuery::new()
        .with_offset(params.offset.unwrap_or(0))
        .with_order(params.order.unwrap_or_default());
    query.limit = params.limit;
    Ok(Json(manager.list_all(&principal, query).await?))
}

async fn fetch<R>(
    State(manager): State<Arc<QueryManager<R>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<Versioned<R>>, AccessError>
where
    R: Resource + Serialize,
    R::Id: FromStr,
{
    let id = parse_id(&manager, &id)?;
    Ok(Json(manager.get_versioned(&principal, &id).await?))
}

async fn create<R>(
    State(manager): State<Arc<QueryManager<R>>>,
    Extension(principal): Extension<Principal>,
    Json(data): Json<R>,
) -> Result<(StatusCode, Json<R>), AccessError>
where
    R: Resource + Serialize + DeserializeOwned,
{
    let created = manager.create(&principal, data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<R>(
    State(manager): State<Arc<QueryManager<R>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(patch): Json<PatchRequest>,
) -> Result<Json<Versioned<R>>, AccessError>
where
    R: Resource + Serialize,
    R::Id: FromStr,
{
    let id = parse_id(&manager, &id)?;
    let updated = match patch.version {
        Some(version) => {
            manager
                .update_versioned(&principal, &id, version, patch.attributes)
                .await?
        }
        None => manager.update_tracked(&principal, &id, patch.attributes).await?,
    };
    Ok(Json(updated))
}

async fn remove<R>(
    State(manager): State<Arc<QueryManager<R>>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<StatusCode, AccessError>
where
    R: Resource,
    R::Id: FromStr,
{
    let id = parse_id(&manager, &id)?;
    manager.delete(&principal, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
