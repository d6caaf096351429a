// ============================================================================
// Transaction Scopes
// ============================================================================
//
// `TransactionScope` wraps a unit of work in begin/commit/rollback:
//
// - the work runs inside a fresh transaction, which commits on success;
// - on failure the transaction is rolled back, the compensation callback runs,
//   and the original error is returned unchanged;
// - transient faults re-run the whole unit under the retry policy;
// - `start_transaction(false)` runs the work as-is, for composition inside a
//   transaction that is already open.
//
// ============================================================================

pub mod state;

pub use state::{Transaction, TransactionId, TransactionState};

use std::time::Duration;

use futures::future::BoxFuture;
use log::warn;
use tracing::{Instrument, Level, event, info_span};

use crate::config::RetryPolicy;
use crate::context::DataContext;
use crate::core::{RepoError, Result};

type RollbackCallback<'c> = Box<dyn Fn(&RepoError) + Send + Sync + 'c>;

pub struct TransactionScope<'c, C: DataContext + ?Sized> {
    context: &'c C,
    start_transaction: bool,
    on_rollback: Option<RollbackCallback<'c>>,
    retry: RetryPolicy,
}

impl<'c, C: DataContext + ?Sized> TransactionScope<'c, C> {
    /// A scope that starts a transaction and retries with the context's
    /// execution strategy.
    pub fn new(context: &'c C) -> Self {
        Self {
            context,
            start_transaction: true,
            on_rollback: None,
            retry: context.execution_strategy(),
        }
    }

    /// `false` runs the work once, without beginning a transaction.
    pub fn start_transaction(mut self, start: bool) -> Self {
        self.start_transaction = start;
        self
    }

    /// Compensation run after a rollback, with the error that caused it.
    pub fn on_rollback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&RepoError) + Send + Sync + 'c,
    {
        self.on_rollback = Some(Box::new(callback));
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs `operation` against `state` (typically the repositories it uses).
    ///
    /// ```ignore
    /// let id = TransactionScope::new(ctx.as_ref())
    ///     .run(&mut orders, |orders| Box::pin(async move {
    ///         let order = orders.add(Order::new("A-1")).await?;
    ///         Ok(order.id)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn run<S, T, F>(&self, state: &mut S, mut operation: F) -> Result<T>
    where
        S: Send,
        T: Send,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T>> + Send,
    {
        if !self.start_transaction {
            return operation(state).await;
        }

        let span = info_span!(
            "repository.transaction",
            max_attempts = self.retry.max_attempts.max(1)
        );

        async move {
            let mut attempt = 1;
            loop {
                match self.attempt(state, &mut operation).await {
                    Ok(value) => return Ok(value),
                    Err(err) => {
                        if !self.retry.should_retry(attempt, &err) {
                            return Err(err);
                        }

                        let backoff_ms = self.retry.backoff_ms(attempt);
                        warn!(
                            "transaction attempt {} of {} failed with a transient fault: {} (backoff={}ms)",
                            attempt,
                            self.retry.max_attempts.max(1),
                            err,
                            backoff_ms
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        attempt += 1;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn attempt<S, T, F>(&self, state: &mut S, operation: &mut F) -> Result<T>
    where
        S: Send,
        T: Send,
        F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, Result<T>> + Send,
    {
        let id = self.context.begin_transaction().await?;
        event!(Level::DEBUG, transaction = %id, "transaction started");

        let outcome = match operation(state).await {
            Ok(value) => self.context.commit_transaction().await.map(|_| value),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(value) => {
                event!(Level::DEBUG, transaction = %id, "transaction committed");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.context.rollback_transaction().await {
                    warn!("rollback of transaction {} failed: {}", id, rollback_err);
                }
                event!(Level::WARN, transaction = %id, error = %err, "transaction rolled back");

                if let Some(callback) = &self.on_rollback {
                    callback(&err);
                }
                Err(err)
            }
        }
    }
}
