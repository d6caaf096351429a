// ============================================================================
// Generic Repository
// ============================================================================
//
// `Repository<T, C>` shapes caller intent into requests against a data
// context: it composes soft-delete filters with caller predicates, rewrites
// projections so deleted children do not leak through them, resolves cascade
// include paths, and stages commands on the change tracker.
//
// A repository instance carries mutable per-unit-of-work state (the fetch
// override and its latch). Create one per request or unit of work; reads take
// `&mut self`, so one instance cannot serve two operations at once.
//
// ============================================================================

pub mod cascade;
pub mod command;
pub mod condition;
pub mod fetch_state;
pub mod projection;
pub mod read;
pub mod set_property;

pub use fetch_state::{FetchSnapshot, SoftDeleteFetchState};
pub use projection::ProjectionRewriter;
pub use set_property::SetPropertyBuilder;

use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::{DataContext, MemoryContext};
use crate::core::{Result, Value};
use crate::expression::Expr;
use crate::metadata::{Entity, EntityDescriptor};
use crate::query::QueryOptions;

pub struct Repository<T: Entity, C: DataContext + ?Sized = MemoryContext> {
    context: Arc<C>,
    entity: Arc<EntityDescriptor>,
    fetch_state: SoftDeleteFetchState,
    save_changes_after_every_operation: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity, C: DataContext + ?Sized> Repository<T, C> {
    /// Builds a repository for `T`, which must be registered in the context's metadata.
    pub fn new(context: Arc<C>) -> Result<Self> {
        let entity = context.metadata().get(T::NAME)?;
        let options = context.options();

        Ok(Self {
            fetch_state: SoftDeleteFetchState::from_options(options),
            save_changes_after_every_operation: options.save_changes_after_every_operation,
            entity,
            context,
            _entity: PhantomData,
        })
    }

    pub fn context(&self) -> &Arc<C> {
        &self.context
    }

    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.entity
    }

    pub fn fetch_state(&self) -> &SoftDeleteFetchState {
        &self.fetch_state
    }

    pub fn saves_after_every_operation(&self) -> bool {
        self.save_changes_after_every_operation
    }

    // ------------------------------------------------------------------
    // State and configuration
    // ------------------------------------------------------------------

    /// Whether commands commit immediately (`true`) or wait for
    /// [`save_changes`](Self::save_changes).
    pub fn change_save_changes_choice(&mut self, save_after_every_operation: bool) {
        self.save_changes_after_every_operation = save_after_every_operation;
    }

    /// Includes (or excludes) soft-deleted rows in the next operation, or in
    /// every following one when reset-after-operation is off.
    pub fn fetch_soft_deleted_entities(&mut self, fetch: bool) {
        self.fetch_state.set_fetch_deleted(fetch);
    }

    pub fn soft_delete_fetch_state_reset_after_operation(&mut self, reset: bool) {
        self.fetch_state.set_reset_after_operation(reset);
    }

    pub fn reset_soft_deleted_entity_fetch_state(&mut self) {
        self.fetch_state.reset();
    }

    /// Soft-delete clause AND `predicate`, per the current fetch state.
    ///
    /// Observes the fetch state: the override is consumed when reset is on.
    pub fn create_condition_expression(&mut self, predicate: Option<Expr>) -> Option<Expr> {
        let snapshot = self.fetch_state.observe();
        condition::compose_condition(&self.entity, snapshot, predicate)
    }

    /// `Key.Equals(key)` AND [`create_condition_expression`](Self::create_condition_expression).
    pub fn create_key_equality_expression_with_is_deleted_false(
        &mut self,
        key: impl Into<Value>,
        predicate: Option<Expr>,
    ) -> Expr {
        let snapshot = self.fetch_state.observe();
        condition::compose_key_condition(&self.entity, snapshot, key.into(), predicate)
    }

    /// Rewrites a projection with the fetch state latched by the latest
    /// condition built on this repository.
    pub fn update_projection_expression(&self, projection: Option<Expr>) -> Option<Expr> {
        projection::rewrite_projection(
            self.context.metadata(),
            self.entity.clone(),
            self.fetch_state.last_observed(),
            projection,
        )
    }

    pub fn cascade_property_paths(&self) -> Result<Vec<String>> {
        let paths = cascade::cascade_property_paths(
            self.context.metadata(),
            &self.entity,
            self.context.options().max_cascade_depth,
        )?;
        Ok(paths.as_ref().clone())
    }

    /// Adds every cascade path to the includes of `options`.
    pub fn include_navigation_properties(&self, mut options: QueryOptions) -> Result<QueryOptions> {
        for path in self.cascade_property_paths()? {
            if !options.includes.contains(&path) {
                options.includes.push(path);
            }
        }
        Ok(options)
    }
}
