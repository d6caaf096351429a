// ============================================================================
// Query Shaping
// ============================================================================
//
// `QueryOptions` carries everything a read can ask for besides soft-delete
// visibility: a predicate, dynamic filter conditions, ordering, paging,
// navigation includes and change tracking.
//
// ============================================================================

pub mod filter;
pub mod page;
pub mod sort;

pub use filter::{FilterCondition, FilterOperator, compile_conditions};
pub use page::Page;
pub use sort::{NullOrdering, OrderBy, RecordComparator, sort_records, validate_order_by};

use crate::expression::Expr;

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub predicate: Option<Expr>,
    pub conditions: Vec<FilterCondition>,
    pub order_by: Vec<OrderBy>,
    pub skip: Option<usize>,
    pub take: Option<usize>,
    /// Dotted navigation paths to materialize (`Lines.Product`)
    pub includes: Vec<String>,
    /// Attach returned entities to the change tracker
    pub tracking: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(mut self, conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn order_by(mut self, property: impl Into<String>) -> Self {
        self.order_by.push(OrderBy::asc(property));
        self
    }

    pub fn order_by_descending(mut self, property: impl Into<String>) -> Self {
        self.order_by.push(OrderBy::desc(property));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(path.into());
        self
    }

    pub fn tracking(mut self, tracking: bool) -> Self {
        self.tracking = tracking;
        self
    }
}

/// Applies skip/take to an already ordered sequence.
pub fn apply_paging<T>(items: Vec<T>, skip: Option<usize>, take: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(skip.unwrap_or(0));
    match take {
        Some(take) => iter.take(take).collect(),
        None => iter.collect(),
    }
}
