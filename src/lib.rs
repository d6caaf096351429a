// ============================================================================
// repokit
// ============================================================================
//
// A generic repository layer over an injected data context:
//
// - soft-delete aware reads with a per-operation "fetch deleted" override,
// - projections rewritten so soft-deleted children stay hidden,
// - cascade include paths discovered from entity metadata,
// - change-tracked commands with an immediate or deferred save policy,
// - set-based update/delete that turn into soft deletes where applicable,
// - transaction scopes with compensation and transient-fault retries.
//
// ============================================================================

extern crate self as repokit;

pub mod config;
pub mod context;
pub mod core;
pub mod evaluator;
pub mod expression;
pub mod metadata;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod storage;
pub mod transaction;

pub use config::{RepositoryOptions, RetryPolicy};
pub use context::{DataContext, MemoryContext};
pub use core::{Record, RepoError, Result, Value};
pub use expression::Expr;
pub use metadata::{Entity, EntityDescriptor, MetadataRegistry};
pub use query::{FilterCondition, FilterOperator, OrderBy, Page, QueryOptions};
pub use repository::{Repository, SetPropertyBuilder};
pub use transaction::TransactionScope;

pub use repokit_derive::Entity;
