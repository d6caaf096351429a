//! Everything an application typically needs to define entities and work
//! with repositories.

pub use crate::config::{RepositoryOptions, RetryPolicy};
pub use crate::context::{DataContext, EntryState, MemoryContext};
pub use crate::core::{Record, RepoError, Result, Value};
pub use crate::expression::Expr;
pub use crate::metadata::{Entity, MetadataRegistry};
pub use repokit_derive::Entity;
pub use crate::query::{FilterCondition, FilterOperator, OrderBy, Page, QueryOptions};
pub use crate::repository::{Repository, SetPropertyBuilder};
pub use crate::transaction::TransactionScope;

pub use futures::future::BoxFuture;
