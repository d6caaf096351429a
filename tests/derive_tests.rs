mod common;

use std::sync::Arc;

use common::*;
use repokit::metadata::{Capabilities, PropertyKind, ScalarType};
use repokit::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Entity)]
#[serde(rename_all = "PascalCase")]
#[entity(name = "Invoice", key = "Code")]
struct InvoiceRow {
    code: Uuid,
    #[serde(rename = "Amount")]
    #[entity(rename = "Amount")]
    total_amount: f64,
    #[entity(nullable)]
    note: String,
    tags: Vec<String>,
    #[serde(skip)]
    #[entity(skip)]
    cached_label: Option<String>,
}

fn kind(descriptor: &repokit::EntityDescriptor, property: &str) -> PropertyKind {
    descriptor
        .property(property)
        .unwrap_or_else(|| panic!("missing property {}", property))
        .kind()
        .clone()
}

#[test]
fn test_scalar_kinds_and_nullability() {
    let order = Order::descriptor();
    assert_eq!(Order::NAME, "Order");
    assert_eq!(order.key(), "Id");

    assert_eq!(kind(&order, "Id"), PropertyKind::Scalar(ScalarType::Integer));
    assert_eq!(kind(&order, "Total"), PropertyKind::Scalar(ScalarType::Float));
    assert_eq!(kind(&order, "IsDeleted"), PropertyKind::Scalar(ScalarType::Boolean));
    assert_eq!(kind(&order, "CreationDate"), PropertyKind::Scalar(ScalarType::Timestamp));
    assert_eq!(kind(&order, "CreatorUserName"), PropertyKind::Scalar(ScalarType::Text));

    assert!(order.property("CustomerId").is_some_and(|p| p.is_nullable()));
    assert!(order.property("Number").is_some_and(|p| !p.is_nullable()));
}

#[test]
fn test_navigations() {
    let order = Order::descriptor();

    let lines = order.property("Lines").expect("Lines");
    assert!(lines.is_collection() && lines.is_cascade());
    assert_eq!(lines.target(), Some("OrderLine"));
    assert_eq!(lines.foreign_key(), Some("OrderId"));

    let customer = order.property("Customer").expect("Customer");
    assert!(customer.is_navigation() && !customer.is_collection() && !customer.is_cascade());
    assert_eq!(customer.target(), Some("Customer"));
    assert_eq!(customer.foreign_key(), Some("CustomerId"));

    let orders = Customer::descriptor();
    let navigation = orders.property("Orders").expect("Orders");
    assert_eq!(navigation.target(), Some("Order"));
    assert!(!navigation.is_cascade());
}

#[test]
fn test_capabilities_follow_declared_properties() {
    let order = Order::descriptor().capabilities();
    assert_eq!(
        order,
        Capabilities {
            soft_delete: true,
            creation_date: true,
            creator_user_name: true,
            modification_date: true,
            modifier_user_name: true,
            deletion_date: true,
            deleter_user_name: true,
            transaction_id: true,
        }
    );

    let line = OrderLine::descriptor().capabilities();
    assert!(line.soft_delete && line.deletion_date);
    assert!(!line.deleter_user_name && !line.creation_date);

    assert_eq!(Product::descriptor().capabilities(), Capabilities::default());
    assert!(!Product::descriptor().is_soft_deletable());
}

#[test]
fn test_struct_and_field_options() {
    let invoice = InvoiceRow::descriptor();
    assert_eq!(InvoiceRow::NAME, "Invoice");
    assert_eq!(invoice.name(), "Invoice");
    assert_eq!(invoice.key(), "Code");

    assert_eq!(kind(&invoice, "Code"), PropertyKind::Scalar(ScalarType::Uuid));
    assert_eq!(kind(&invoice, "Amount"), PropertyKind::Scalar(ScalarType::Float));
    assert_eq!(kind(&invoice, "Tags"), PropertyKind::Scalar(ScalarType::Json));
    assert!(invoice.property("Note").is_some_and(|p| p.is_nullable()));
    assert!(invoice.property("TotalAmount").is_none());
    assert!(invoice.property("CachedLabel").is_none());
}

#[tokio::test]
async fn test_derived_entity_round_trips_through_a_repository() -> anyhow::Result<()> {
    let metadata = MetadataRegistry::new().with_entity::<InvoiceRow>()?;
    let ctx = Arc::new(MemoryContext::new(metadata));
    let mut invoices: Repository<InvoiceRow> = Repository::new(ctx.clone())?;

    let added = invoices
        .add(InvoiceRow {
            code: Uuid::nil(),
            total_amount: 99.5,
            note: "first".into(),
            tags: vec!["urgent".into()],
            cached_label: Some("not stored".into()),
        })
        .await?;
    assert!(!added.code.is_nil());

    let loaded = invoices.get_by_id(added.code, false).await?.expect("stored");
    assert_eq!(loaded.total_amount, 99.5);
    assert_eq!(loaded.tags, vec!["urgent".to_string()]);
    assert_eq!(loaded.cached_label, None);
    Ok(())
}
