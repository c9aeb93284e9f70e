// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the StoreGate CLI

pub mod catalog;
pub mod config;

pub use self::catalog::CatalogCommand;
pub use self::config::ConfigCommand;
