// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! StoreGate access kernel
//!
//! Permission catalog, role resolution, request authorization and
//! scope-filtered data access for the retail back office.
//!
//! # Architecture
//!
//! - **Domain:** permission ids, principals, scope predicates, resource
//!   descriptors, the store contract
//! - **Application:** `PermissionCatalog`, `RoleResolver`, `AccessGuard`,
//!   `QueryManager`, role administration
//! - **Infrastructure:** audit logging, in-memory and PostgreSQL stores
//! - **Presentation:** axum role administration and resource routes

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::catalog::{CatalogSnapshot, PermissionCatalog};
pub use application::guard::{AccessGuard, RequireMode};
pub use application::query_manager::{ListQuery, QueryManager};
pub use application::resolver::RoleResolver;
pub use domain::errors::{AccessError, CatalogError};
pub use domain::permission::{BuiltinRole, PermissionId};
pub use domain::principal::Principal;
pub use domain::resource::{Resource, ResourceDescriptor};
pub use domain::scope::ScopePredicate;
