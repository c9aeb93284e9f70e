// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Inventory Resources
//!
//! `Product` is the store-scoped resource the retail back office manages
//! through the kernel. Each product belongs to exactly one store; managers and
//! cashiers only ever see products of the store in their `store_id` attribute.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attribute::{AttributeSource, AttributeValue};
use super::permission::InvalidPermissionId;
use super::resource::{
    DeletionPolicy, OperationPermissions, Resource, ResourceDescriptor, ValidationError,
};
use super::scope::ScopePredicate;

pub const PRODUCT_RESOURCE: &str = "product";
pub const STORE_ID: &str = "store_id";
/// Derived attribute: quantity at or below the reorder level.
pub const IS_LOW_STOCK: &str = "is_low_stock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

impl ProductId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl std::str::FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Grocery,
    Dairy,
    Meat,
    Produce,
    Bakery,
    Frozen,
    Beverages,
    Household,
    PersonalCare,
    #[default]
    Other,
}

impl ProductCategory {
    const ALL: [ProductCategory; 10] = [
        ProductCategory::Grocery,
        ProductCategory::Dairy,
        ProductCategory::Meat,
        ProductCategory::Produce,
        ProductCategory::Bakery,
        ProductCategory::Frozen,
        ProductCategory::Beverages,
        ProductCategory::Household,
        ProductCategory::PersonalCare,
        ProductCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Grocery => "grocery",
            ProductCategory::Dairy => "dairy",
            ProductCategory::Meat => "meat",
            ProductCategory::Produce => "produce",
            ProductCategory::Bakery => "bakery",
            ProductCategory::Frozen => "frozen",
            ProductCategory::Beverages => "beverages",
            ProductCategory::Household => "household",
            ProductCategory::PersonalCare => "personal_care",
            ProductCategory::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// A stocked product. Monetary amounts are integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Replaced with a fresh key on create.
    #[serde(default)]
    pub id: ProductId,
    /// Owning store. Stamped from the creating principal when omitted.
    pub store_id: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sku: String,
    #[serde(default)]
    pub category: ProductCategory,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub cost_cents: i64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default = "default_reorder_level")]
    pub reorder_level: i64,
    pub supplier_id: Option<i64>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_reorder_level() -> i64 {
    10
}

impl Product {
    pub fn new(name: impl Into<String>, sku: impl Into<String>) -> Self {
        Self {
            id: ProductId::new(),
            store_id: None,
            name: name.into(),
            description: String::new(),
            sku: sku.into(),
            category: ProductCategory::default(),
            price_cents: 0,
            cost_cents: 0,
            quantity: 0,
            reorder_level: default_reorder_level(),
            supplier_id: None,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    pub fn in_store(mut self, store_id: i64) -> Self {
        self.store_id = Some(store_id);
        self
    }

    pub fn with_category(mut self, category: ProductCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_price(mut self, price_cents: i64, cost_cents: i64) -> Self {
        self.price_cents = price_cents;
        self.cost_cents = cost_cents;
        self
    }

    pub fn with_quantity(mut self, quantity: i64) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl AttributeSource for Product {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "id" => AttributeValue::Text(self.id.to_string()),
            STORE_ID => self.store_id.into(),
            "name" => self.name.as_str().into(),
            "description" => self.description.as_str().into(),
            "sku" => self.sku.as_str().into(),
            "category" => self.category.as_str().into(),
            "price_cents" => self.price_cents.into(),
            "cost_cents" => self.cost_cents.into(),
            "quantity" => self.quantity.into(),
            "reorder_level" => self.reorder_level.into(),
            "supplier_id" => self.supplier_id.into(),
            "is_deleted" => self.is_deleted.into(),
            IS_LOW_STOCK => self.is_low_stock().into(),
            _ => return None,
        };
        Some(value)
    }
}

fn expect_int(field: &str, value: &AttributeValue) -> Result<i64, ValidationError> {
    value
        .as_int()
        .ok_or_else(|| ValidationError::new(field, format!("expected int, got {}", value.kind())))
}

fn expect_optional_int(field: &str, value: &AttributeValue) -> Result<Option<i64>, ValidationError> {
    if value.is_null() {
        return Ok(None);
    }
    expect_int(field, value).map(Some)
}

fn expect_text(field: &str, value: &AttributeValue) -> Result<String, ValidationError> {
    value
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| ValidationError::new(field, format!("expected text, got {}", value.kind())))
}

impl Resource for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }

    fn assign_id(&mut self) {
        self.id = ProductId::new();
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<(), ValidationError> {
        match name {
            STORE_ID => self.store_id = expect_optional_int(name, &value)?,
            "name" => self.name = expect_text(name, &value)?,
            "description" => self.description = expect_text(name, &value)?,
            "sku" => self.sku = expect_text(name, &value)?,
            "category" => {
                let raw = expect_text(name, &value)?;
                self.category = ProductCategory::from_name(&raw)
                    .ok_or_else(|| ValidationError::new(name, format!("unknown category '{}'", raw)))?;
            }
            "price_cents" => self.price_cents = expect_int(name, &value)?,
            "cost_cents" => self.cost_cents = expect_int(name, &value)?,
            "quantity" => self.quantity = expect_int(name, &value)?,
            "reorder_level" => self.reorder_level = expect_int(name, &value)?,
            "supplier_id" => self.supplier_id = expect_optional_int(name, &value)?,
            "is_deleted" => {
                self.is_deleted = value
                    .as_bool()
                    .ok_or_else(|| ValidationError::new(name, format!("expected bool, got {}", value.kind())))?;
            }
            "id" | "created_at" | "is_low_stock" => {
                return Err(ValidationError::new(name, "attribute is read-only"));
            }
            _ => return Err(ValidationError::new(name, "unknown attribute")),
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name", "must not be empty"));
        }
        if self.sku.trim().is_empty() {
            return Err(ValidationError::new("sku", "must not be empty"));
        }
        for (field, amount) in [
            ("price_cents", self.price_cents),
            ("cost_cents", self.cost_cents),
            ("quantity", self.quantity),
            ("reorder_level", self.reorder_level),
        ] {
            if amount < 0 {
                return Err(ValidationError::new(field, "must not be negative"));
            }
        }
        Ok(())
    }
}

/// Store-scoped product descriptor gated by the `inventory:*` permissions.
/// Deleted products are retained with `is_deleted = true`.
pub fn product_descriptor() -> Result<ResourceDescriptor, InvalidPermissionId> {
    Ok(
        ResourceDescriptor::new(PRODUCT_RESOURCE, OperationPermissions::conventional("inventory")?)
            .with_scope_for_all(ScopePredicate::equals_principal(STORE_ID, STORE_ID))
            .with_required_attribute(STORE_ID)
            .with_required_attribute("name")
            .with_required_attribute("sku")
            .with_deletion_policy(DeletionPolicy::Soft {
                attribute: "is_deleted".to_string(),
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource::Operation;

    #[test]
    fn test_attribute_view_and_patching() {
        let mut product = Product::new("Oat Milk", "OAT-1L").with_quantity(3);
        assert_eq!(product.attribute(STORE_ID), Some(AttributeValue::Null));
        assert_eq!(product.attribute("is_low_stock"), Some(AttributeValue::Bool(true)));

        product.set_attribute(STORE_ID, 4.into()).unwrap();
        product.set_attribute("category", "dairy".into()).unwrap();
        assert_eq!(product.store_id, Some(4));
        assert_eq!(product.category, ProductCategory::Dairy);
    }

    #[test]
    fn test_set_attribute_rejects_bad_writes() {
        let mut product = Product::new("Oat Milk", "OAT-1L");
        assert!(product.set_attribute("id", "x".into()).is_err());
        assert!(product.set_attribute("quantity", "ten".into()).is_err());
        assert!(product.set_attribute("category", "furniture".into()).is_err());
        assert!(product.set_attribute("colour", "red".into()).is_err());
    }

    #[test]
    fn test_validate_rejects_negative_amounts() {
        let product = Product::new("Bread", "BRD-01").with_price(-1, 0);
        assert_eq!(product.validate().unwrap_err().field, "price_cents");
    }

    #[test]
    fn test_product_descriptor_scopes_every_operation_by_store() {
        let descriptor = product_descriptor().unwrap();
        let manager = crate::domain::attribute::Attributes::from([(STORE_ID.to_string(), AttributeValue::Int(1))]);
        let own = Product::new("Eggs", "EGG-12").in_store(1);
        let other = Product::new("Eggs", "EGG-12").in_store(2);

        for op in Operation::ALL {
            let scope = descriptor.scope_for(op);
            assert!(scope.evaluate(&manager, &own));
            assert!(!scope.evaluate(&manager, &other));
        }
    }
}
