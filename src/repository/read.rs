use log::debug;
use serde::de::DeserializeOwned;

use super::fetch_state::FetchSnapshot;
use super::{Repository, condition, projection};
use crate::context::{DataContext, FetchRequest};
use crate::core::{Record, RepoError, Result, Value};
use crate::expression::{Expr, and_also};
use crate::metadata::{Entity, from_record, from_value};
use crate::query::{Page, QueryOptions, compile_conditions, validate_order_by};

impl<T: Entity, C: DataContext + ?Sized> Repository<T, C> {
    /// Validates `options` and turns it into a request for one operation.
    ///
    /// Validation runs before the fetch state is observed, so a rejected call
    /// does not consume a pending override.
    fn prepare(&mut self, options: QueryOptions) -> Result<(FetchRequest, FetchSnapshot)> {
        let conditions = compile_conditions(&self.entity, &options.conditions)?;
        validate_order_by(&self.entity, &options.order_by)?;
        for path in &options.includes {
            self.context.metadata().resolve_navigation_path(&self.entity, path)?;
        }

        let snapshot = self.fetch_state.observe();
        let predicate = condition::compose_condition(
            &self.entity,
            snapshot,
            and_also(options.predicate, conditions),
        );
        if let Some(predicate) = &predicate {
            debug!("composed condition for '{}': {}", self.entity.name(), predicate);
        }

        let request = FetchRequest {
            entity: self.entity.name().to_string(),
            predicate,
            order_by: options.order_by,
            skip: options.skip,
            take: options.take,
            includes: options.includes,
            include_deleted_navigations: snapshot.include_deleted(),
            tracking: options.tracking,
        };
        Ok((request, snapshot))
    }

    async fn fetch_entities(&self, request: FetchRequest) -> Result<Vec<T>> {
        self.context
            .fetch(request)
            .await?
            .into_iter()
            .map(from_record::<T>)
            .collect()
    }

    /// First matching entity in storage order, or `None`.
    pub async fn get_first_or_default(
        &mut self,
        predicate: Option<Expr>,
        tracking: bool,
    ) -> Result<Option<T>> {
        let mut options = QueryOptions::new().take(1).tracking(tracking);
        options.predicate = predicate;
        self.get_first_with(options).await
    }

    /// Like [`get_first_or_default`](Self::get_first_or_default), honoring the
    /// ordering and includes of `options`.
    pub async fn get_first_with(&mut self, options: QueryOptions) -> Result<Option<T>> {
        let (request, _) = self.prepare(options.take(1))?;
        Ok(self.fetch_entities(request).await?.into_iter().next())
    }

    /// The only matching entity, `None` when nothing matches, an error when
    /// more than one does.
    pub async fn get_single_or_default(
        &mut self,
        predicate: Option<Expr>,
        tracking: bool,
    ) -> Result<Option<T>> {
        let mut options = QueryOptions::new().tracking(tracking);
        options.predicate = predicate;

        let (request, _) = self.prepare(options)?;
        let request = request.take(2);
        let mut records = self.context.fetch(request).await?;

        if records.len() > 1 {
            return Err(RepoError::MultipleResults(format!(
                "get_single_or_default on '{}'",
                self.entity.name()
            )));
        }
        records.pop().map(from_record::<T>).transpose()
    }

    pub async fn get_by_id(&mut self, key: impl Into<Value>, tracking: bool) -> Result<Option<T>> {
        let request = self.key_request(key.into(), Vec::new())?.tracking(tracking);
        Ok(self.fetch_entities(request).await?.into_iter().next())
    }

    /// Loads an entity tracked, ready to be passed to [`delete`](Self::delete).
    ///
    /// With `include_navigation`, every cascade path is materialized so the
    /// delete reaches the dependent rows too.
    pub async fn get_for_delete(
        &mut self,
        key: impl Into<Value>,
        include_navigation: bool,
    ) -> Result<Option<T>> {
        let includes = if include_navigation {
            self.cascade_property_paths()?
        } else {
            Vec::new()
        };

        let request = self.key_request(key.into(), includes)?.tracking(true);
        Ok(self.fetch_entities(request).await?.into_iter().next())
    }

    fn key_request(&mut self, key: Value, includes: Vec<String>) -> Result<FetchRequest> {
        let snapshot = self.fetch_state.observe();
        let predicate = condition::compose_key_condition(&self.entity, snapshot, key, None);

        let mut request = FetchRequest::new(self.entity.name()).predicate(Some(predicate));
        request.includes = includes;
        request.include_deleted_navigations = snapshot.include_deleted();
        Ok(request)
    }

    pub async fn get_all(&mut self, tracking: bool) -> Result<Vec<T>> {
        self.get_with(QueryOptions::new().tracking(tracking)).await
    }

    pub async fn get_some(&mut self, predicate: Expr, tracking: bool) -> Result<Vec<T>> {
        self.get_with(QueryOptions::new().filter(predicate).tracking(tracking)).await
    }

    /// Full query: predicate, dynamic conditions, ordering, paging, includes.
    pub async fn get_with(&mut self, options: QueryOptions) -> Result<Vec<T>> {
        let (request, _) = self.prepare(options)?;
        self.fetch_entities(request).await
    }

    /// One page of results; `page_number` starts at 1. Skip/take of `options`
    /// are replaced by the page window.
    pub async fn get_page(
        &mut self,
        options: QueryOptions,
        page_number: usize,
        page_size: usize,
    ) -> Result<Page<T>> {
        if page_size == 0 {
            return Err(RepoError::Developer("Page size must be greater than zero".into()));
        }
        if page_number == 0 {
            return Err(RepoError::Developer("Page numbers start at 1".into()));
        }
        let skip = (page_number - 1)
            .checked_mul(page_size)
            .ok_or_else(|| RepoError::Developer("Page window out of range".into()))?;

        // Count and items share one snapshot
        let (mut request, _) = self.prepare(options)?;
        let total_count = self
            .context
            .count(self.entity.name(), request.predicate.as_ref())
            .await?;

        request.skip = Some(skip);
        request.take = Some(page_size);
        let items = self.fetch_entities(request).await?;

        Ok(Page {
            items,
            total_count,
            page_number,
            page_size,
        })
    }

    pub async fn count(&mut self, predicate: Option<Expr>) -> Result<usize> {
        let snapshot = self.fetch_state.observe();
        let predicate = condition::compose_condition(&self.entity, snapshot, predicate);
        self.context.count(self.entity.name(), predicate.as_ref()).await
    }

    pub async fn exists(&mut self, predicate: Option<Expr>) -> Result<bool> {
        Ok(self.count(predicate).await? > 0)
    }

    // ------------------------------------------------------------------
    // Projections
    // ------------------------------------------------------------------

    async fn project<R: DeserializeOwned>(
        &mut self,
        options: QueryOptions,
        selector: Expr,
    ) -> Result<Vec<R>> {
        let (request, snapshot) = self.prepare(options)?;
        let selector = projection::rewrite_projection(
            self.context.metadata(),
            self.entity.clone(),
            snapshot,
            Some(selector),
        )
        .ok_or_else(|| RepoError::Developer("Projection is required".into()))?;

        debug!("projection for '{}': {}", self.entity.name(), selector);
        self.context
            .project(request, &selector)
            .await?
            .into_iter()
            .map(from_value::<R>)
            .collect()
    }

    /// First matching row shaped by `selector`. The root filter and any
    /// collection read inside `selector` follow the same soft-delete visibility.
    pub async fn get_first_or_default_projected<R: DeserializeOwned>(
        &mut self,
        predicate: Option<Expr>,
        selector: Expr,
    ) -> Result<Option<R>> {
        let mut options = QueryOptions::new().take(1);
        options.predicate = predicate;
        Ok(self.project(options, selector).await?.into_iter().next())
    }

    pub async fn get_all_projected<R: DeserializeOwned>(
        &mut self,
        options: QueryOptions,
        selector: Expr,
    ) -> Result<Vec<R>> {
        self.project(options, selector).await
    }

    /// Untyped rows with navigations as the context materializes them.
    pub async fn get_records(&mut self, options: QueryOptions) -> Result<Vec<Record>> {
        let (request, _) = self.prepare(options)?;
        self.context.fetch(request).await
    }
}
