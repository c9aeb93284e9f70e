// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Query manager behaviour for a resource defined outside the crate.
//!
//! `Ticket` is owned by one user and may be shared. Owners and shared
//! tickets are readable; only owners may write. Tickets are hard-deleted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use storegate_core::domain::attribute::{AttributeSource, AttributeValue, Attributes};
use storegate_core::domain::repository::{ResourceStore, Versioned};
use storegate_core::domain::resource::{OperationPermissions, ScopeRule, ValidationError};
use storegate_core::infrastructure::in_memory_store::InMemoryResourceStore;
use storegate_core::{
    AccessError, AccessGuard, BuiltinRole, CatalogError, ListQuery, PermissionCatalog, PermissionId, Principal,
    QueryManager, Resource, ResourceDescriptor, ScopePredicate,
};

static NEXT_TICKET: AtomicU32 = AtomicU32::new(1000);

#[derive(Debug, Clone, PartialEq)]
struct Ticket {
    id: u32,
    owner: Option<String>,
    title: String,
    shared: bool,
}

impl Ticket {
    fn new(id: u32, title: &str) -> Self {
        Self {
            id,
            owner: None,
            title: title.to_string(),
            shared: false,
        }
    }
}

impl AttributeSource for Ticket {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "id" => Some(AttributeValue::Int(self.id as i64)),
            "owner" => Some(self.owner.clone().into()),
            "title" => Some(self.title.as_str().into()),
            "shared" => Some(self.shared.into()),
            _ => None,
        }
    }
}

impl Resource for Ticket {
    type Id = u32;

    fn id(&self) -> u32 {
        self.id
    }

    fn assign_id(&mut self) {
        self.id = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<(), ValidationError> {
        match (name, value) {
            ("owner", AttributeValue::Text(owner)) => self.owner = Some(owner),
            ("title", AttributeValue::Text(title)) => self.title = title,
            ("shared", AttributeValue::Bool(shared)) => self.shared = shared,
            (name, value) => {
                return Err(ValidationError::new(name, format!("cannot write {}", value.kind())));
            }
        }
        Ok(())
    }
}

fn pid(s: &str) -> PermissionId {
    PermissionId::parse(s).unwrap()
}

fn catalog() -> Arc<PermissionCatalog> {
    let catalog = PermissionCatalog::new();
    for action in ["create", "read", "update"] {
        catalog
            .register(&format!("tickets:{action}"), &[BuiltinRole::Manager, BuiltinRole::Cashier])
            .unwrap();
    }
    catalog.register("tickets:delete", &[BuiltinRole::Manager]).unwrap();

    let owner = || ScopePredicate::equals_principal("owner", "user");
    let descriptor = ResourceDescriptor::new("ticket", OperationPermissions::conventional("tickets").unwrap())
        .with_scope_rule(ScopeRule::new(
            pid("tickets:read"),
            owner().or(ScopePredicate::equals("shared", true)),
        ))
        .with_scope_rule(ScopeRule::new(pid("tickets:create"), owner()))
        .with_scope_rule(ScopeRule::new(pid("tickets:update"), owner()))
        .with_scope_rule(ScopeRule::new(pid("tickets:delete"), owner()))
        .with_required_attribute("owner");
    catalog.register_resource_descriptor(descriptor).unwrap();
    Arc::new(catalog)
}

fn tickets() -> (QueryManager<Ticket>, InMemoryResourceStore<Ticket>) {
    let store = InMemoryResourceStore::new("ticket");
    let manager = QueryManager::new(AccessGuard::new(catalog()), Arc::new(store.clone()), "ticket").unwrap();
    (manager, store)
}

fn user(name: &str, role: BuiltinRole) -> Principal {
    Principal::new(name, role).with_attribute("user", name)
}

fn patch(name: &str, value: AttributeValue) -> Attributes {
    [(name.to_string(), value)].into_iter().collect()
}

#[test]
fn test_unknown_resource_is_rejected() {
    let store: InMemoryResourceStore<Ticket> = InMemoryResourceStore::new("ticket");
    let err = QueryManager::new(AccessGuard::new(catalog()), Arc::new(store), "invoice").err();
    assert_eq!(err, Some(CatalogError::UnknownResource("invoice".to_string())));
}

#[tokio::test]
async fn test_create_stamps_owner_and_round_trips() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);

    let created = tickets.create(&ana, Ticket::new(1, "till jams")).await.unwrap();
    assert_eq!(created.owner.as_deref(), Some("ana"));
    assert_eq!(tickets.get(&ana, &created.id).await.unwrap(), created);
}

#[tokio::test]
async fn test_shared_tickets_are_readable_but_not_writable_by_others() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);
    let bo = user("bo", BuiltinRole::Cashier);

    let private = tickets.create(&ana, Ticket::new(0, "private")).await.unwrap();
    let shared = tickets.create(&ana, Ticket::new(0, "shared")).await.unwrap();
    tickets.update(&ana, &shared.id, patch("shared", true.into())).await.unwrap();

    let visible = tickets.list_all(&bo, ListQuery::new()).await.unwrap();
    assert_eq!(visible.iter().map(|t| t.id).collect::<Vec<_>>(), vec![shared.id]);
    assert!(tickets.get(&bo, &private.id).await.unwrap_err().is_not_found());

    let err = tickets.update(&bo, &shared.id, patch("title", "mine now".into())).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn test_ownership_transfer_is_rejected() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);
    let created = tickets.create(&ana, Ticket::new(0, "till jams")).await.unwrap();

    let err = tickets.update(&ana, &created.id, patch("owner", "bo".into())).await.unwrap_err();
    assert!(err.is_validation(), "{err:?}");
}

#[tokio::test]
async fn test_hard_delete_removes_row() {
    let (tickets, store) = tickets();
    let ana = user("ana", BuiltinRole::Manager);
    let created = tickets.create(&ana, Ticket::new(0, "printer")).await.unwrap();

    tickets.delete(&ana, &created.id).await.unwrap();
    assert!(store.is_empty().await);
    assert!(tickets.delete(&ana, &created.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_requires_its_own_permission() {
    let (tickets, store) = tickets();
    let cy = user("cy", BuiltinRole::Cashier);
    let created = tickets.create(&cy, Ticket::new(0, "scale")).await.unwrap();

    let err = tickets.delete(&cy, &created.id).await.unwrap_err();
    assert!(matches!(
        err,
        AccessError::PermissionDenied { ref required, .. } if required == &vec![pid("tickets:delete")]
    ));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_denied_before_existence_is_checked() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Manager);
    let created = tickets.create(&ana, Ticket::new(0, "till jams")).await.unwrap();

    let cashier = Principal::new("ops", BuiltinRole::Cashier);
    // same denial whether or not the ticket exists
    for id in [created.id, 99] {
        assert!(tickets.delete(&cashier, &id).await.unwrap_err().is_permission_denied());
    }
}

#[tokio::test]
async fn test_admin_holds_permissions_but_not_scope() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);
    tickets.create(&ana, Ticket::new(0, "till jams")).await.unwrap();

    let admin = user("root", BuiltinRole::Admin);
    assert!(tickets.list_all(&admin, ListQuery::new()).await.unwrap().is_empty());
    assert!(tickets.create(&admin, Ticket::new(0, "audit")).await.is_ok());
}

#[tokio::test]
async fn test_create_ignores_caller_chosen_keys() {
    let (tickets, store) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);
    let bo = user("bo", BuiltinRole::Cashier);
    let hidden = tickets.create(&ana, Ticket::new(0, "private")).await.unwrap();
    assert!(tickets.get(&bo, &hidden.id).await.unwrap_err().is_not_found());

    // reusing an out-of-scope key behaves like any fresh create
    let reused = tickets.create(&bo, Ticket::new(hidden.id, "guess")).await.unwrap();
    let fresh = tickets.create(&bo, Ticket::new(4242, "fresh")).await.unwrap();
    assert_ne!(reused.id, hidden.id);
    assert_ne!(fresh.id, 4242);
    assert_eq!(tickets.get(&ana, &hidden.id).await.unwrap().title, "private");
    assert_eq!(store.len().await, 3);
}

async fn seed_by_key(store: &dyn ResourceStore<Ticket>, ids: &[u32]) {
    for &id in ids {
        let mut ticket = Ticket::new(id, "seeded");
        ticket.owner = Some("ana".to_string());
        store.insert(ticket).await.unwrap();
    }
}

async fn assert_listed_in_key_order(store: Arc<dyn ResourceStore<Ticket>>) {
    seed_by_key(store.as_ref(), &[10, 2, 9]).await;
    let tickets = QueryManager::new(AccessGuard::new(catalog()), store, "ticket").unwrap();
    let ana = user("ana", BuiltinRole::Cashier);
    let ids = |rows: Vec<Ticket>| rows.into_iter().map(|t| t.id).collect::<Vec<_>>();

    assert_eq!(ids(tickets.list_all(&ana, ListQuery::new()).await.unwrap()), vec![2, 9, 10]);
    assert_eq!(
        ids(tickets.list_all(&ana, ListQuery::new().with_offset(1).with_limit(1)).await.unwrap()),
        vec![9]
    );
}

#[tokio::test]
async fn test_list_follows_numeric_key_order() {
    assert_listed_in_key_order(Arc::new(InMemoryResourceStore::new("ticket"))).await;
}

#[tokio::test]
async fn test_unconditional_update_returns_committed_version() {
    let (tickets, _) = tickets();
    let ana = user("ana", BuiltinRole::Cashier);
    let created = tickets.create(&ana, Ticket::new(0, "till jams")).await.unwrap();

    let first: Versioned<Ticket> = tickets
        .update_tracked(&ana, &created.id, patch("title", "till jammed".into()))
        .await
        .unwrap();
    assert_eq!(first.version, 2);
    assert_eq!(first.entity.title, "till jammed");

    let second = tickets
        .update_tracked(&ana, &created.id, patch("shared", true.into()))
        .await
        .unwrap();
    assert_eq!(second.version, 3);
}
