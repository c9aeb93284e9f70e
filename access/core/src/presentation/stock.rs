// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stock routes, merged next to the product resource routes:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/low-stock` | products at or below reorder level (`offset`, `limit`) |
//! | PUT | `/{id}/stock` | adjust quantity by `{"quantity": delta}` |

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::application::query_manager::ListQuery;
use crate::application::stock::StockService;
use crate::domain::errors::AccessError;
use crate::domain::inventory::{Product, ProductId, PRODUCT_RESOURCE};
use crate::domain::principal::Principal;
use crate::domain::repository::Versioned;

#[derive(Debug, Default, Deserialize)]
pub struct LowStockParams {
    #[serde(alias = "skip")]
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Signed change to apply.
    pub quantity: i64,
}

pub fn stock_router(service: Arc<StockService>) -> Router {
    Router::new()
        .route("/low-stock", get(low_stock))
        .route("/{id}/stock", put(adjust))
        .with_state(service)
}

async fn low_stock(
    State(service): State<Arc<StockService>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<LowStockParams>,
) -> Result<Json<Vec<Product>>, AccessError> {
    let mut query = ListQuery::new().with_offset(params.offset.unwrap_or(0));
    query.limit = params.limit;
    Ok(Json(service.low_stock(&principal, query).await?))
}

async fn adjust(
    State(service): State<Arc<StockService>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> Result<Json<Versioned<Product>>, AccessError> {
    let id: ProductId = id.parse().map_err(|_| AccessError::NotFound {
        resource: PRODUCT_RESOURCE.to_string(),
        id,
    })?;
    Ok(Json(service.adjust_stock(&principal, &id, adjustment.quantity).await?))
}
