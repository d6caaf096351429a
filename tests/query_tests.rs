mod common;

use common::*;
use repokit::prelude::*;

async fn seed_products(ctx: &MemoryContext) -> anyhow::Result<()> {
    ctx.seed([
        Product::new(1, "Bolt", 0.5),
        Product::new(2, "Nut", 0.2),
        Product::new(3, "Washer", 0.1),
        Product::new(4, "Bolt cutter", 12.0),
    ])
    .await?;
    Ok(())
}

fn names(products: &[Product]) -> Vec<&str> {
    products.iter().map(|p| p.name.as_str()).collect()
}

#[tokio::test]
async fn test_conditions_parsed_from_json() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    let conditions: Vec<FilterCondition> = serde_json::from_str(
        r#"[
            { "property": "Name", "operator": "contains", "value": "BOLT" },
            { "property": "Price", "operator": "lt", "value": 1.0 }
        ]"#,
    )?;
    let found = products.get_with(QueryOptions::new().conditions(conditions)).await?;
    assert_eq!(names(&found), vec!["Bolt"]);

    let in_list: FilterCondition =
        serde_json::from_str(r#"{ "property": "Id", "operator": "in", "value": [2, 3] }"#)?;
    let found = products
        .get_with(QueryOptions::new().condition(in_list).order_by("Id"))
        .await?;
    assert_eq!(names(&found), vec!["Nut", "Washer"]);
    Ok(())
}

#[tokio::test]
async fn test_conditions_combine_with_predicate() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    let options = QueryOptions::new()
        .filter(Expr::prop("Price").gt(0.15))
        .condition(FilterCondition::new("Name", FilterOperator::StartsWith, "b"))
        .order_by_descending("Price");
    assert_eq!(names(&products.get_with(options).await?), vec!["Bolt cutter", "Bolt"]);
    Ok(())
}

#[tokio::test]
async fn test_ordering_and_paging() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    let ascending = products.get_with(QueryOptions::new().order_by("Price")).await?;
    assert_eq!(names(&ascending), vec!["Washer", "Nut", "Bolt", "Bolt cutter"]);

    let window = products
        .get_with(QueryOptions::new().order_by("Name").skip(1).take(2))
        .await?;
    assert_eq!(names(&window), vec!["Bolt cutter", "Nut"]);

    let page = products.get_page(QueryOptions::new().order_by("Id"), 2, 3).await?;
    assert_eq!(page.total_count, 4);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(names(&page.items), vec!["Bolt cutter"]);
    assert!(page.has_previous_page());
    assert!(!page.has_next_page());
    Ok(())
}

#[tokio::test]
async fn test_page_counts_follow_fetch_state() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let page = orders.get_page(QueryOptions::new().order_by("Id"), 1, 10).await?;
    assert_eq!(page.total_count, 2);

    orders.fetch_soft_deleted_entities(true);
    let page = orders.get_page(QueryOptions::new().order_by("Id"), 1, 2).await?;
    assert_eq!(page.total_count, 3);
    assert_eq!(page.items.iter().map(|o| o.id).collect::<Vec<_>>(), vec![1, 2]);
    assert!(page.has_next_page());
    Ok(())
}

#[tokio::test]
async fn test_invalid_page_arguments() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    assert!(products.get_page(QueryOptions::new(), 1, 0).await.unwrap_err().is_developer_error());
    assert!(products.get_page(QueryOptions::new(), 0, 5).await.unwrap_err().is_developer_error());
    Ok(())
}

#[tokio::test]
async fn test_page_window_overflow_is_rejected() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    let err = products.get_page(QueryOptions::new(), usize::MAX, 2).await.unwrap_err();
    assert!(err.is_developer_error());

    // The largest representable window is still served
    let page = products.get_page(QueryOptions::new(), usize::MAX, 1).await?;
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 4);
    Ok(())
}

#[tokio::test]
async fn test_structural_mistakes_are_developer_errors() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let err = orders
        .get_with(QueryOptions::new().condition(FilterCondition::new(
            "Colour",
            FilterOperator::Eq,
            "red",
        )))
        .await
        .unwrap_err();
    assert!(
        matches!(err, RepoError::PropertyNotFound { ref property, .. } if property == "Colour")
    );

    let err = orders.get_with(QueryOptions::new().order_by("Colour")).await.unwrap_err();
    assert!(err.is_developer_error());

    let err = orders.get_with(QueryOptions::new().order_by("Lines")).await.unwrap_err();
    assert!(err.is_developer_error());

    let err = orders.get_with(QueryOptions::new().include("Lines.Nope")).await.unwrap_err();
    assert!(matches!(err, RepoError::PropertyNotFound { .. }));

    let err = orders.get_with(QueryOptions::new().include("Number")).await.unwrap_err();
    assert!(err.is_developer_error());

    let err = orders.get_some(Expr::prop("Colour").eq("red"), false).await.unwrap_err();
    assert!(err.is_developer_error());
    Ok(())
}

#[tokio::test]
async fn test_text_filter_requires_text_value() -> anyhow::Result<()> {
    let ctx = context();
    seed_products(&ctx).await?;
    let mut products = repository::<Product>(&ctx);

    let err = products
        .get_with(QueryOptions::new().condition(FilterCondition::new(
            "Name",
            FilterOperator::Contains,
            3,
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::TypeMismatch(_)));
    Ok(())
}

#[tokio::test]
async fn test_count_and_exists() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    assert_eq!(orders.count(None).await?, 2);
    assert!(!orders.exists(Some(Expr::prop("Id").eq(2))).await?);

    orders.fetch_soft_deleted_entities(true);
    assert!(orders.exists(Some(Expr::prop("Id").eq(2))).await?);
    assert_eq!(orders.count(Some(Expr::prop("Total").gt_eq(20.0))).await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_get_records_materializes_includes() -> anyhow::Result<()> {
    let ctx = context();
    seed_graph(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let records = orders
        .get_records(
            QueryOptions::new()
                .filter(Expr::prop("Id").eq(1))
                .include("Lines")
                .include("Customer"),
        )
        .await?;
    assert_eq!(records.len(), 1);

    let lines = records[0].get("Lines").and_then(Value::as_list).expect("lines list");
    assert_eq!(lines.len(), 1);
    let customer = records[0].get("Customer").and_then(Value::as_object).expect("customer");
    assert_eq!(customer.get("Name"), Some(&Value::from("Contoso")));
    Ok(())
}
