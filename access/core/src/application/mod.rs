// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application layer: the catalog, permission resolution, the guard and the
//! permission-aware query manager.

pub mod bootstrap;
pub mod catalog;
pub mod guard;
pub mod query_manager;
pub mod resolver;
pub mod role_admin;
pub mod stock;
