mod common;

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::*;
use repokit::prelude::*;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 1,
        max_backoff_ms: 1,
    }
}

#[tokio::test]
async fn test_scope_commits_and_stamps_transaction_id() -> anyhow::Result<()> {
    let ctx = context();
    let mut orders = repository::<Order>(&ctx);

    let (added, id) = TransactionScope::new(ctx.as_ref())
        .run(&mut orders, |orders| {
            Box::pin(async move {
                let added = orders.add(Order::new(0, "T-1")).await?;
                Ok((added, orders.context().current_transaction()))
            })
        })
        .await?;

    let id = id.expect("work ran inside a transaction");
    assert_eq!(added.transaction_id, Some(id.as_uuid().to_string()));
    assert!(!ctx.in_transaction());

    let row = stored_row(&ctx, "Order", added.id).await.expect("committed");
    assert_eq!(row.get("TransactionId"), Some(&id.to_value()));
    Ok(())
}

#[tokio::test]
async fn test_failure_rolls_back_and_runs_compensation() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);
    let seen = Mutex::new(Vec::new());

    let result: repokit::Result<()> = TransactionScope::new(ctx.as_ref())
        .on_rollback(|err| seen.lock().expect("lock").push(err.to_string()))
        .run(&mut orders, |orders| {
            Box::pin(async move {
                orders.add(Order::new(0, "lost")).await?;
                orders
                    .execute_update(None, SetPropertyBuilder::new().set("Total", 0.0))
                    .await?;
                Err(RepoError::ExecutionError("boom".into()))
            })
        })
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, RepoError::ExecutionError(ref msg) if msg == "boom"));
    assert_eq!(seen.lock().expect("lock").as_slice(), ["Execution error: boom"]);

    assert_eq!(ctx.rows("Order").await.len(), 3);
    let row = stored_row(&ctx, "Order", 1).await.expect("row 1");
    assert_eq!(row.get("Total"), Some(&Value::Float(10.0)));
    assert!(ctx.tracked_entries()?.is_empty());
    assert!(!ctx.in_transaction());
    Ok(())
}

#[tokio::test]
async fn test_scope_without_transaction_runs_work_as_is() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let result: repokit::Result<()> = TransactionScope::new(ctx.as_ref())
        .start_transaction(false)
        .run(&mut orders, |orders| {
            Box::pin(async move {
                assert!(!orders.context().in_transaction());
                orders
                    .execute_update(
                        Some(Expr::prop("Id").eq(1)),
                        SetPropertyBuilder::new().set("Total", 1.0),
                    )
                    .await?;
                Err(RepoError::ExecutionError("after the write".into()))
            })
        })
        .await;
    assert!(result.is_err());

    // Nothing to roll back
    let row = stored_row(&ctx, "Order", 1).await.expect("row 1");
    assert_eq!(row.get("Total"), Some(&Value::Float(1.0)));
    Ok(())
}

#[tokio::test]
async fn test_transient_fault_reruns_the_whole_unit() -> anyhow::Result<()> {
    let ctx = context();
    let mut orders = repository::<Order>(&ctx);
    let attempts = Arc::new(AtomicUsize::new(0));
    let rollbacks = AtomicUsize::new(0);

    let added = TransactionScope::new(ctx.as_ref())
        .retry(fast_retry())
        .on_rollback(|_| {
            rollbacks.fetch_add(1, Ordering::SeqCst);
        })
        .run(&mut orders, |orders| {
            let attempts = attempts.clone();
            Box::pin(async move {
                let added = orders.add(Order::new(0, "R-1")).await?;
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(RepoError::Transient("deadlock victim".into()));
                }
                Ok(added)
            })
        })
        .await?;

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(rollbacks.load(Ordering::SeqCst), 1);

    let rows = ctx.rows("Order").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Id"), Some(&Value::Integer(added.id)));
    Ok(())
}

#[tokio::test]
async fn test_retries_stop_at_max_attempts() -> anyhow::Result<()> {
    let ctx = context();
    let mut orders = repository::<Order>(&ctx);
    let attempts = Arc::new(AtomicUsize::new(0));

    let result: repokit::Result<()> = TransactionScope::new(ctx.as_ref())
        .retry(fast_retry())
        .run(&mut orders, |_| {
            let attempts = attempts.clone();
            Box::pin(async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(RepoError::Transient("timeout".into()))
            })
        })
        .await;

    assert!(result.unwrap_err().is_transient());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn test_nested_begin_is_rejected_and_rolled_back() -> anyhow::Result<()> {
    let ctx = context();
    seed_orders(&ctx).await?;
    let mut orders = repository::<Order>(&ctx);

    let result: repokit::Result<()> = TransactionScope::new(ctx.as_ref())
        .run(&mut orders, |orders| {
            Box::pin(async move {
                orders.add(Order::new(0, "inner")).await?;
                orders.context().begin_transaction().await?;
                Ok(())
            })
        })
        .await;

    assert!(matches!(result, Err(RepoError::TransactionError(_))));
    assert_eq!(ctx.rows("Order").await.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_scope_over_several_repositories() -> anyhow::Result<()> {
    let ctx = context();
    let mut repositories = (repository::<Order>(&ctx), repository::<Product>(&ctx));

    TransactionScope::new(ctx.as_ref())
        .run(&mut repositories, |(orders, products)| {
            Box::pin(async move {
                orders.add(Order::new(0, "multi")).await?;
                products.add(Product::new(0, "Bolt", 0.5)).await?;
                Ok(())
            })
        })
        .await?;

    assert_eq!(ctx.rows("Order").await.len(), 1);
    assert_eq!(ctx.rows("Product").await.len(), 1);
    Ok(())
}
