// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value objects, the resource capability interface, the store
//! contract and kernel errors. Nothing in here performs I/O.

pub mod attribute;
pub mod config;
pub mod errors;
pub mod inventory;
pub mod permission;
pub mod principal;
pub mod repository;
pub mod resource;
pub mod scope;
