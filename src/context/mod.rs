// ============================================================================
// Data Context
// ============================================================================
//
// The capability a repository is built on: entity sets that can be queried
// with expressions, a change tracker, a save operation, set-based commands,
// the context-wide soft-deletion toggle, the current-user hook used for
// auditing, and transactions.
//
// `MemoryContext` is the in-memory implementation used by tests and small
// hosts. An adapter over a real database implements the same trait.
//
// ============================================================================

pub mod memory;
pub mod tracker;

pub use memory::{MemoryContext, MemoryContextBuilder};
pub use tracker::{ChangeTracker, EntryState, TrackedEntry};

use async_trait::async_trait;

use crate::config::{RepositoryOptions, RetryPolicy};
use crate::core::{Record, Result, Value};
use crate::evaluator::EvaluatorRegistry;
use crate::expression::Expr;
use crate::metadata::MetadataRegistry;
use crate::query::OrderBy;
use crate::transaction::TransactionId;

/// A read against one entity set.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub entity: String,
    pub predicate: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    /// Validated dotted navigation paths to materialize
    pub includes: Vec<String>,
    /// Keep soft-deleted rows inside materialized navigations
    pub include_deleted_navigations: bool,
    pub tracking: bool,
}

impl FetchRequest {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    pub fn predicate(mut self, predicate: Option<Expr>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }
}

/// One `SET property = value` of a set-based update. The value is evaluated
/// against each affected row, so it can refer to the row's current values.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub property: String,
    pub value: Expr,
}

impl Assignment {
    pub fn new(property: impl Into<String>, value: impl Into<Expr>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait DataContext: Send + Sync {
    fn metadata(&self) -> &MetadataRegistry;

    fn options(&self) -> &RepositoryOptions;

    fn evaluators(&self) -> &EvaluatorRegistry;

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Matching rows with every navigation present: included navigations are
    /// materialized, the others are empty lists or null.
    async fn fetch(&self, request: FetchRequest) -> Result<Vec<Record>>;

    /// Evaluates `projection` against every matching root row.
    async fn project(&self, request: FetchRequest, projection: &Expr) -> Result<Vec<Value>>;

    async fn count(&self, entity: &str, predicate: Option<&Expr>) -> Result<usize>;

    // ------------------------------------------------------------------
    // Change tracking
    // ------------------------------------------------------------------

    fn find_tracked(&self, entity: &str, key: &Value) -> Result<Option<TrackedEntry>>;

    /// Stops tracking an entity. Returns whether it was tracked.
    fn detach(&self, entity: &str, key: &Value) -> Result<bool>;

    /// Starts tracking as `Unchanged`.
    fn attach(&self, entity: &str, record: Record) -> Result<()>;

    /// Starts tracking as `Added`; returns the record with its key assigned.
    fn add(&self, entity: &str, record: Record) -> Result<Record>;

    /// Marks every scalar property modified.
    fn update(&self, entity: &str, record: Record) -> Result<()>;

    /// Marks only `properties` modified, leaving the rest of the entry as tracked.
    fn update_properties(&self, entity: &str, record: Record, properties: &[String]) -> Result<()>;

    fn remove(&self, entity: &str, record: Record) -> Result<()>;

    /// Tracked state of an entity, if tracked.
    fn entry(&self, entity: &str, key: &Value) -> Result<Option<TrackedEntry>> {
        self.find_tracked(entity, key)
    }

    /// Commits pending changes and returns the number of affected rows.
    async fn save_changes(&self) -> Result<usize>;

    // ------------------------------------------------------------------
    // Set-based commands, bypassing the change tracker
    // ------------------------------------------------------------------

    async fn execute_update(
        &self,
        entity: &str,
        predicate: Option<&Expr>,
        assignments: &[Assignment],
    ) -> Result<usize>;

    async fn execute_delete(&self, entity: &str, predicate: Option<&Expr>) -> Result<usize>;

    // ------------------------------------------------------------------
    // Context-wide behavior
    // ------------------------------------------------------------------

    /// Whether deletions of soft-deletable entities become `IsDeleted` updates.
    fn is_soft_deletion_active(&self) -> bool;

    fn set_soft_deletion_active(&self, active: bool);

    /// User name stamped on creator/modifier/deleter columns.
    fn current_user_name(&self) -> Option<String>;

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    async fn begin_transaction(&self) -> Result<TransactionId>;

    async fn commit_transaction(&self) -> Result<()>;

    async fn rollback_transaction(&self) -> Result<()>;

    fn current_transaction(&self) -> Option<TransactionId>;

    fn in_transaction(&self) -> bool {
        self.current_transaction().is_some()
    }

    /// Retry strategy wrapped around transaction scopes.
    fn execution_strategy(&self) -> RetryPolicy {
        self.options().retry.clone()
    }
}
