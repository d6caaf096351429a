mod common;

use common::*;
use repokit::prelude::*;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct OrderSummary {
    id: i64,
    line_skus: Vec<String>,
    line_count: i64,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct CustomerSummary {
    name: String,
    order_numbers: Vec<String>,
    open_lines: Vec<i64>,
}

fn order_summary() -> Expr {
    Expr::object([
        ("Id", Expr::prop("Id")),
        ("LineSkus", Expr::prop("Lines").select(Expr::prop("Sku")).to_list()),
        ("LineCount", Expr::prop("Lines").count()),
    ])
}

fn not_deleted() -> Expr {
    Expr::prop("IsDeleted").eq(false)
}

#[tokio::test]
async fn test_condition_expression_composition() -> anyhow::Result<()> {
    let ctx = context();
    let mut orders = repository::<Order>(&ctx);

    assert_eq!(orders.create_condition_expression(None), Some(not_deleted()));

    let predicate = Expr::prop("Total").gt(5.0);
    assert_eq!(
        orders.create_condition_expression(Some(predicate.clone())),
        Some(not_deleted().and(predicate.clone()))
    );

    orders.fetch_soft_deleted_entities(true);
    assert_eq!(orders.create_condition_expression(Some(predicate.clone())), Some(predicate));
    orders.fetch_soft_deleted_entities(true);
    assert_eq!(orders.create_condition_expression(None), None);

    let key_condition = orders.create_key_equality_expression_with_is_deleted_false(3, None);
    assert_eq!(key_condition.to_string(), "(x.Id.Equals(3) && (x.IsDeleted == false))");
    Ok(())
}

#[tokio::test]
async fn test_predicate_order_does_not_change_results() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    ctx.seed([Order::new(4, "B-4").total(40.0).deleted(), Order::new(5, "B-5").total(50.0)])
        .await?;
    let mut orders = repository::<Order>(&ctx);

    let a = Expr::prop("Total").gt(15.0);
    let b = Expr::prop("Number").starts_with("B");

    let ab = orders.count(Some(a.clone().and(b.clone()))).await?;
    let ba = orders.count(Some(b.clone().and(a.clone()))).await?;
    let nested = orders.count(Some(Expr::lit(true).and(a).and(b))).await?;

    assert_eq!(ab, 1);
    assert_eq!(ab, ba);
    assert_eq!(ab, nested);
    Ok(())
}

#[tokio::test]
async fn test_key_equality_tolerates_foreign_key_types() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    assert!(orders.get_by_id("3", false).await?.is_none());
    assert!(orders.get_by_id(3, false).await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_projection_hides_deleted_children() -> anyhow::Result<()> {
    let ctx = context();
    seed_graph(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let summaries: Vec<OrderSummary> = orders
        .get_all_projected(QueryOptions::new().order_by("Id"), order_summary())
        .await?;

    assert_eq!(
        summaries,
        vec![
            OrderSummary {
                id: 1,
                line_skus: vec!["SKU-10".into()],
                line_count: 1,
            },
            OrderSummary {
                id: 3,
                line_skus: vec!["SKU-12".into()],
                line_count: 1,
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_projection_and_root_share_one_snapshot() -> anyhow::Result<()> {
    let ctx = context();
    seed_graph(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    // The override resets after the root condition is built, yet the
    // projection of the same call still includes deleted children
    orders.fetch_soft_deleted_entities(true);
    let summaries: Vec<OrderSummary> = orders
        .get_all_projected(QueryOptions::new().order_by("Id"), order_summary())
        .await?;
    assert_eq!(summaries.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(summaries[0].line_count, 2);
    assert_eq!(summaries[0].line_skus, vec!["SKU-10".to_string(), "SKU-11".to_string()]);

    let first: Option<OrderSummary> = orders
        .get_first_or_default_projected(Some(Expr::prop("Id").eq(1)), order_summary())
        .await?;
    assert_eq!(first.map(|s| s.line_count), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_update_projection_follows_last_condition() -> anyhow::Result<()> {
    let ctx = context();
    let mut orders = repository::<Order>(&ctx);
    let projection = order_summary();

    orders.fetch_soft_deleted_entities(true);
    let condition = orders.create_condition_expression(Some(Expr::prop("Id").eq(1)));
    assert_eq!(condition, Some(Expr::prop("Id").eq(1)));
    assert!(!orders.fetch_state().is_fetching_deleted());
    assert_eq!(
        orders.update_projection_expression(Some(projection.clone())),
        Some(projection.clone())
    );

    orders.create_condition_expression(None);
    let rewritten = orders.update_projection_expression(Some(projection.clone()));
    let expected = Expr::object([
        ("Id", Expr::prop("Id")),
        (
            "LineSkus",
            Expr::prop("Lines").filter(not_deleted()).select(Expr::prop("Sku")).to_list(),
        ),
        ("LineCount", Expr::prop("Lines").filter(not_deleted()).count()),
    ]);
    assert_eq!(rewritten, Some(expected));
    assert_eq!(orders.update_projection_expression(None), None);
    Ok(())
}

#[tokio::test]
async fn test_nested_projection_through_non_soft_deletable_root() -> anyhow::Result<()> {
    let ctx = context();
    seed_graph(&ctx).await?;
    let mut customers = repository::<Customer>(&ctx);

    let projection = Expr::object([
        ("Name", Expr::prop("Name")),
        ("OrderNumbers", Expr::prop("Orders").select(Expr::prop("Number")).to_list()),
        (
            "OpenLines",
            Expr::prop("Orders")
                .select(Expr::prop("Lines").count())
                .to_list(),
        ),
    ]);

    let summary: Option<CustomerSummary> = customers
        .get_first_or_default_projected(None, projection)
        .await?;
    assert_eq!(
        summary,
        Some(CustomerSummary {
            name: "Contoso".into(),
            order_numbers: vec!["A-1".into(), "A-3".into()],
            open_lines: vec![1, 1],
        })
    );
    Ok(())
}
