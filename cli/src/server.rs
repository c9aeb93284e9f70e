// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server for the access kernel
//!
//! Mounts the role administration routes, the product resource and its
//! stock routes behind the principal header middleware.

use anyhow::{Context, Result};
use axum::{extract::State, middleware, routing::get, Json, Router};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use storegate_core::application::bootstrap::catalog_from_manifest;
use storegate_core::application::role_admin::{NoRoleAssignments, RoleAdministrationService};
use storegate_core::application::stock::StockService;
use storegate_core::domain::config::KernelConfigManifest;
use storegate_core::domain::inventory::{Product, PRODUCT_RESOURCE};
use storegate_core::domain::repository::ResourceStore;
use storegate_core::infrastructure::in_memory_store::InMemoryResourceStore;
use storegate_core::infrastructure::postgres_store::{self, PostgresResourceStore};
use storegate_core::presentation::api::{admin_router, principal_from_header};
use storegate_core::presentation::resources::resource_router;
use storegate_core::presentation::stock::stock_router;
use storegate_core::{AccessGuard, PermissionCatalog, QueryManager};

#[derive(Args, Debug)]
pub struct ServeOptions {
    /// HTTP API host
    #[arg(long, env = "STOREGATE_HOST", default_value = "127.0.0.1")]
    host: String,

    /// HTTP API port
    #[arg(long, env = "STOREGATE_PORT", default_value = "8000")]
    port: u16,

    /// PostgreSQL connection string; products are kept in memory without it
    #[arg(long, env = "STOREGATE_DATABASE_URL")]
    database_url: Option<String>,

    /// Connection pool size
    #[arg(long, default_value = "5")]
    max_connections: u32,
}

pub async fn serve(options: ServeOptions, config_path: Option<PathBuf>) -> Result<()> {
    let manifest = KernelConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let catalog = Arc::new(catalog_from_manifest(&manifest).context("Failed to build access catalog")?);
    let guard = AccessGuard::new(catalog.clone());

    let store = product_store(&options).await?;
    let products = QueryManager::new(guard.clone(), store, PRODUCT_RESOURCE)
        .context("Product resource is not registered; enable include_standard_permissions")?
        .with_pagination(manifest.spec.pagination);
    let stock = StockService::new(products.clone()).context("Failed to initialize stock management")?;

    // No user directory is attached, so custom role deletion never sees assignments.
    warn!("Role assignment lookup not configured; custom roles can be deleted while assigned");
    let roles = RoleAdministrationService::new(guard, Arc::new(NoRoleAssignments))
        .context("Failed to initialize role administration")?;

    let state = Arc::new(ServerState {
        catalog,
        start_time: Instant::now(),
    });

    let api = Router::new()
        .merge(admin_router(Arc::new(roles)))
        .nest(
            "/products",
            resource_router(products).merge(stock_router(Arc::new(stock))),
        )
        .layer(middleware::from_fn(principal_from_header));

    let app = Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .nest("/api", api);

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("StoreGate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("StoreGate shutting down");

    Ok(())
}

async fn product_store(options: &ServeOptions) -> Result<Arc<dyn ResourceStore<Product>>> {
    match &options.database_url {
        Some(url) => {
            let pool = postgres_store::connect(url, options.max_connections).await?;
            postgres_store::ensure_schema(&pool)
                .await
                .context("Failed to prepare resources table")?;
            info!("Products stored in PostgreSQL");
            Ok(Arc::new(PostgresResourceStore::<Product>::new(pool, PRODUCT_RESOURCE)))
        }
        None => {
            info!("Products stored in memory");
            Ok(Arc::new(InMemoryResourceStore::<Product>::new(PRODUCT_RESOURCE)))
        }
    }
}

struct ServerState {
    catalog: Arc<PermissionCatalog>,
    start_time: Instant,
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "catalog_generation": state.catalog.generation(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
