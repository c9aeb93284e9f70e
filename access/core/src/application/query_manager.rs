// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Query Manager
//!
//! Permission-aware data access for one resource type. Every operation is
//! gated by the [`AccessGuard`] and filtered by the resource's scope rules
//! before and after it reaches the [`ResourceStore`].
//!
//! ## Write Pipeline
//!
//! ```text
//! AUTHORIZE ──► FETCH ──► SCOPE_CHECK ──► MUTATE ──► COMMIT
//!    │            │            │             │           │
//! PermissionDenied NotFound  NotFound   ValidationFail ConflictFail
//! ```
//!
//! An entity that exists but lies outside the caller's scope fails exactly
//! like one that does not exist. The commit names the version observed at
//! fetch time, so a concurrent writer (or an ownership change) between fetch
//! and commit surfaces as `ConflictFail` rather than a lost update.
//!
//! The descriptor is captured when the manager is built and the catalog is
//! only consulted through short-lived snapshots inside `AccessGuard`, so no
//! catalog lock is ever held across a storage call.

use futures::{StreamExt, TryStreamExt};
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::guard::AccessGuard;
use crate::domain::attribute::{AttributeSource, AttributeValue, Attributes};
use crate::domain::config::PaginationConfig;
use crate::domain::errors::{AccessError, CatalogError};
use crate::domain::principal::Principal;
use crate::domain::repository::{ResourceStore, ScanRequest, SortOrder, Versioned};
use crate::domain::resource::{DeletionPolicy, Operation, Resource, ResourceDescriptor};
use crate::domain::scope::ScopePredicate;

/// Caller-side list parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    /// Extra filter conjoined with the scope predicate. May reference
    /// principal attributes.
    pub filter: ScopePredicate,
    pub order: SortOrder,
    pub offset: usize,
    /// `None` selects the configured default page size.
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: ScopePredicate) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Lazy, finite page of authorized entities.
pub type AccessStream<R> = BoxStream<'static, Result<R, AccessError>>;

pub struct QueryManager<R: Resource> {
    guard: AccessGuard,
    descriptor: Arc<ResourceDescriptor>,
    store: Arc<dyn ResourceStore<R>>,
    pagination: PaginationConfig,
}

impl<R: Resource> Clone for QueryManager<R> {
    fn clone(&self) -> Self {
        Self {
            guard: self.guard.clone(),
            descriptor: Arc::clone(&self.descriptor),
            store: Arc::clone(&self.store),
            pagination: self.pagination,
        }
    }
}

impl<R: Resource> QueryManager<R> {
    /// Bind a manager to the registered descriptor named `resource`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownResource`] if no descriptor was registered
    /// under that name.
    pub fn new(
        guard: AccessGuard,
        store: Arc<dyn ResourceStore<R>>,
        resource: &str,
    ) -> Result<Self, CatalogError> {
        let descriptor = guard
            .resolver()
            .catalog()
            .resource_descriptor(resource)
            .ok_or_else(|| CatalogError::UnknownResource(resource.to_string()))?;

        Ok(Self {
            guard,
            descriptor,
            store,
            pagination: PaginationConfig::default(),
        })
    }

    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    fn authorize(&self, principal: &Principal, operation: Operation) -> Result<(), AccessError> {
        self.guard
            .require_permission(principal, self.descriptor.permission(operation))
    }

    /// Bound scope for `operation`, including the soft-delete filter.
    fn scope_for(&self, principal: &Principal, operation: Operation) -> ScopePredicate {
        let scope = if principal.is_superuser {
            ScopePredicate::Always
        } else {
            self.descriptor.scope_for(operation).bind(principal)
        };

        match &self.descriptor.deletion {
            DeletionPolicy::Hard => scope,
            DeletionPolicy::Soft { attribute } => scope.and(ScopePredicate::negate(
                ScopePredicate::equals(attribute.clone(), true),
            )),
        }
    }

    fn not_found(&self, id: &R::Id) -> AccessError {
        AccessError::NotFound {
            resource: self.descriptor.name.clone(),
            id: id.to_string(),
        }
    }

    fn conflict(&self, id: &R::Id) -> AccessError {
        AccessError::ConflictFail {
            resource: self.descriptor.name.clone(),
            id: id.to_string(),
        }
    }

    async fn fetch_in_scope(
        &self,
        principal: &Principal,
        operation: Operation,
        id: &R::Id,
    ) -> Result<(Versioned<R>, ScopePredicate), AccessError> {
        let scope = self.scope_for(principal, operation);
        match self.store.find_by_id(id).await? {
            Some(current) if scope.matches(&current.entity) => Ok((current, scope)),
            Some(_) => {
                debug!(
                    resource = %self.descriptor.name,
                    %id,
                    principal = %principal.id,
                    "entity outside caller scope"
                );
                Err(self.not_found(id))
            }
            None => Err(self.not_found(id)),
        }
    }

    fn check_invariants(&self, entity: &R) -> Result<(), AccessError> {
        let missing = self.descriptor.missing_attributes(entity);
        if !missing.is_empty() {
            return Err(AccessError::ValidationFail(format!(
                "missing required attribute(s): {}",
                missing.join(", ")
            )));
        }
        entity.validate()?;
        Ok(())
    }

    fn check_in_scope(&self, scope: &ScopePredicate, entity: &R) -> Result<(), AccessError> {
        if scope.matches(entity) {
            Ok(())
        } else {
            Err(AccessError::ValidationFail(format!(
                "{} would fall outside the caller's scope",
                self.descriptor.name
            )))
        }
    }

    /// Authorized, scope-filtered page of entities in primary key order
    /// (ascending unless the query asks otherwise).
    pub async fn list(&self, principal: &Principal, query: ListQuery) -> Result<AccessStream<R>, AccessError> {
        self.authorize(principal, Operation::List)?;

        let filter = self
            .scope_for(principal, Operation::List)
            .and(query.filter.bind(principal));
        let request = ScanRequest {
            filter,
            order: query.order,
            offset: query.offset,
            limit: self.pagination.clamp(query.limit),
        };

        let rows = self.store.scan(request).await?;
        Ok(rows.map_err(AccessError::from).boxed())
    }

    /// [`QueryManager::list`] collected into a `Vec`.
    pub async fn list_all(&self, principal: &Principal, query: ListQuery) -> Result<Vec<R>, AccessError> {
        self.list(principal, query).await?.try_collect().await
    }

    pub async fn get(&self, principal: &Principal, id: &R::Id) -> Result<R, AccessError> {
        self.get_versioned(principal, id).await.map(|v| v.entity)
    }

    /// Like [`QueryManager::get`], also returning the version token to pass
    /// back to [`QueryManager::update_versioned`].
    pub async fn get_versioned(&self, principal: &Principal, id: &R::Id) -> Result<Versioned<R>, AccessError> {
        self.authorize(principal, Operation::Read)?;
        let (current, _) = self.fetch_in_scope(principal, Operation::Read, id).await?;
        Ok(current)
    }

    /// Assign a fresh key, stamp omitted scope attributes from the
    /// principal, validate, persist. Any key the caller supplied is ignored,
    /// so a create can never collide with a row outside the caller's scope.
    pub async fn create(&self, principal: &Principal, mut data: R) -> Result<R, AccessError> {
        self.authorize(principal, Operation::Create)?;
        data.assign_id();

        let template = self.descriptor.scope_for(Operation::Create);
        for (entity_attribute, principal_attribute) in template.principal_bindings() {
            let present = data
                .attribute(entity_attribute)
                .is_some_and(|v| !v.is_null());
            if present {
                continue;
            }
            if let Some(value) = principal.attribute(principal_attribute).filter(|v| !v.is_null()) {
                debug!(resource = %self.descriptor.name, attribute = entity_attribute, %value, "stamping scope attribute");
                data.set_attribute(entity_attribute, value)?;
            }
        }

        self.check_invariants(&data)?;
        self.check_in_scope(&self.scope_for(principal, Operation::Create), &data)?;

        let stored = self.store.insert(data).await?;
        info!(
            resource = %self.descriptor.name,
            id = %stored.entity.id(),
            principal = %principal.id,
            "created"
        );
        Ok(stored.entity)
    }

    pub async fn update(&self, principal: &Principal, id: &R::Id, patch: Attributes) -> Result<R, AccessError> {
        self.update_tracked(principal, id, patch).await.map(|v| v.entity)
    }

    /// Unconditional update returning the row exactly as committed, with its
    /// new version token.
    pub async fn update_tracked(
        &self,
        principal: &Principal,
        id: &R::Id,
        patch: Attributes,
    ) -> Result<Versioned<R>, AccessError> {
        self.apply_update(principal, id, None, patch).await
    }

    /// Update that also fails with `ConflictFail` unless the stored version
    /// still equals `expected_version`, the token the caller read earlier.
    pub async fn update_versioned(
        &self,
        principal: &Principal,
        id: &R::Id,
        expected_version: u64,
        patch: Attributes,
    ) -> Result<Versioned<R>, AccessError> {
        self.apply_update(principal, id, Some(expected_version), patch).await
    }

    async fn apply_update(
        &self,
        principal: &Principal,
        id: &R::Id,
        expected_version: Option<u64>,
        patch: Attributes,
    ) -> Result<Versioned<R>, AccessError> {
        self.authorize(principal, Operation::Update)?;
        let (current, scope) = self.fetch_in_scope(principal, Operation::Update, id).await?;
        if expected_version.is_some_and(|expected| expected != current.version) {
            return Err(self.conflict(id));
        }

        let mut entity = current.entity.clone();
        for (name, value) in patch {
            entity.set_attribute(&name, value)?;
        }
        if entity.id() != current.entity.id() {
            return Err(AccessError::ValidationFail("primary key is immutable".to_string()));
        }
        self.check_invariants(&entity)?;
        self.check_in_scope(&scope, &entity)?;

        let committed = self.store.update(entity, current.version).await?;
        info!(
            resource = %self.descriptor.name,
            %id,
            version = committed.version,
            principal = %principal.id,
            "updated"
        );
        Ok(committed)
    }

    pub async fn delete(&self, principal: &Principal, id: &R::Id) -> Result<(), AccessError> {
        self.apply_delete(principal, id, None).await
    }

    pub async fn delete_versioned(
        &self,
        principal: &Principal,
        id: &R::Id,
        expected_version: u64,
    ) -> Result<(), AccessError> {
        self.apply_delete(principal, id, Some(expected_version)).await
    }

    async fn apply_delete(
        &self,
        principal: &Principal,
        id: &R::Id,
        expected_version: Option<u64>,
    ) -> Result<(), AccessError> {
        self.authorize(principal, Operation::Delete)?;
        let (current, _) = self.fetch_in_scope(principal, Operation::Delete, id).await?;
        if expected_version.is_some_and(|expected| expected != current.version) {
            return Err(self.conflict(id));
        }

        match &self.descriptor.deletion {
            DeletionPolicy::Hard => {
                self.store.delete(id, current.version).await?;
            }
            DeletionPolicy::Soft { attribute } => {
                let mut entity = current.entity;
                entity.set_attribute(attribute, AttributeValue::Bool(true))?;
                self.store.update(entity, current.version).await?;
            }
        }

        info!(resource = %self.descriptor.name, %id, principal = %principal.id, "deleted");
        Ok(())
    }
}
