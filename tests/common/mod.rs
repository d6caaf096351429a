#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repokit::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct Customer {
    pub id: i64,
    pub name: String,
    #[entity(collection = "Order", foreign_key = "CustomerId")]
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub customer_id: Option<i64>,
    pub total: f64,
    pub is_deleted: bool,
    pub creation_date: Option<DateTime<Utc>>,
    pub creator_user_name: Option<String>,
    pub last_modification_date: Option<DateTime<Utc>>,
    pub last_modifier_user_name: Option<String>,
    pub deletion_date: Option<DateTime<Utc>>,
    pub deleter_user_name: Option<String>,
    pub transaction_id: Option<String>,
    #[entity(collection, foreign_key = "OrderId", cascade)]
    pub lines: Vec<OrderLine>,
    #[entity(reference, foreign_key = "CustomerId")]
    pub customer: Option<Customer>,
}

impl Order {
    pub fn new(id: i64, number: &str) -> Self {
        Self {
            id,
            number: number.to_string(),
            customer_id: None,
            total: 0.0,
            is_deleted: false,
            creation_date: None,
            creator_user_name: None,
            last_modification_date: None,
            last_modifier_user_name: None,
            deletion_date: None,
            deleter_user_name: None,
            transaction_id: None,
            lines: Vec::new(),
            customer: None,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }

    pub fn total(mut self, total: f64) -> Self {
        self.total = total;
        self
    }

    pub fn customer(mut self, customer_id: i64) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct OrderLine {
    pub id: i64,
    pub order_id: i64,
    pub sku: String,
    pub quantity: i64,
    pub is_deleted: bool,
    pub deletion_date: Option<DateTime<Utc>>,
    #[entity(collection, foreign_key = "OrderLineId", cascade)]
    pub allocations: Vec<Allocation>,
}

impl OrderLine {
    pub fn new(id: i64, order_id: i64, sku: &str) -> Self {
        Self {
            id,
            order_id,
            sku: sku.to_string(),
            quantity: 1,
            is_deleted: false,
            deletion_date: None,
            allocations: Vec::new(),
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct Allocation {
    pub id: i64,
    pub order_line_id: i64,
    pub warehouse: String,
}

/// Self-referencing cascade tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct Node {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    #[entity(collection, foreign_key = "ParentId", cascade)]
    pub children: Vec<Node>,
}

/// No soft-delete or audit columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub version: i64,
}

impl Product {
    pub fn new(id: i64, name: &str, price: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            price,
            version: 1,
        }
    }
}

pub const CURRENT_USER: &str = "tester";

pub fn metadata() -> MetadataRegistry {
    MetadataRegistry::new()
        .with_entity::<Customer>()
        .and_then(|m| m.with_entity::<Order>())
        .and_then(|m| m.with_entity::<OrderLine>())
        .and_then(|m| m.with_entity::<Allocation>())
        .and_then(|m| m.with_entity::<Node>())
        .and_then(|m| m.with_entity::<Product>())
        .expect("fixture metadata is valid")
}

pub fn context_with(options: RepositoryOptions) -> Arc<MemoryContext> {
    Arc::new(
        MemoryContext::builder(metadata())
            .options(options)
            .current_user(|| Some(CURRENT_USER.to_string()))
            .build(),
    )
}

pub fn context() -> Arc<MemoryContext> {
    context_with(RepositoryOptions::default())
}

/// Orders 1..=3, order 2 soft-deleted.
pub async fn seed_orders(ctx: &MemoryContext) -> anyhow::Result<()> {
    ctx.seed([
        Order::new(1, "A-1").total(10.0),
        Order::new(2, "A-2").total(20.0).deleted(),
        Order::new(3, "A-3").total(30.0),
    ])
    .await?;
    Ok(())
}

/// Customer 1 with orders 1..=3 (order 2 deleted); order 1 has lines 10, 11
/// (11 deleted) and line 10 has one allocation.
pub async fn seed_graph(ctx: &MemoryContext) -> anyhow::Result<()> {
    ctx.seed([Customer {
        id: 1,
        name: "Contoso".into(),
        orders: Vec::new(),
    }])
    .await?;
    ctx.seed([
        Order::new(1, "A-1").total(10.0).customer(1),
        Order::new(2, "A-2").total(20.0).customer(1).deleted(),
        Order::new(3, "A-3").total(30.0).customer(1),
    ])
    .await?;
    ctx.seed([
        OrderLine::new(10, 1, "SKU-10"),
        OrderLine::new(11, 1, "SKU-11").deleted(),
        OrderLine::new(12, 3, "SKU-12"),
    ])
    .await?;
    ctx.seed([Allocation {
        id: 100,
        order_line_id: 10,
        warehouse: "North".into(),
    }])
    .await?;
    Ok(())
}

pub fn repository<T: Entity>(ctx: &Arc<MemoryContext>) -> Repository<T> {
    Repository::new(ctx.clone()).expect("entity is registered")
}

/// Stored row by integer key, soft-deleted rows included.
pub async fn stored_row(ctx: &MemoryContext, entity: &str, id: i64) -> Option<Record> {
    ctx.rows(entity)
        .await
        .into_iter()
        .find(|row| row.get("Id") == Some(&Value::Integer(id)))
}
