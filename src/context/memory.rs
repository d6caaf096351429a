use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::tracker::{ChangeTracker, EntryState, TrackedEntry};
use super::{Assignment, DataContext, FetchRequest};
use crate::config::RepositoryOptions;
use crate::core::{Record, RepoError, Result, Value};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry, Scope};
use crate::expression::Expr;
use crate::metadata::{
    Capabilities, Entity, EntityDescriptor, MetadataRegistry, PropertyKind, ScalarType, names,
    to_record,
};
use crate::query::{apply_paging, sort_records, validate_order_by};
use crate::storage::{Storage, StorageNavigator, scalar_row};
use crate::transaction::{Transaction, TransactionId};

type CurrentUserFn = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Navigation paths to materialize, merged into a tree.
#[derive(Debug, Default)]
struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    fn build(
        metadata: &MetadataRegistry,
        entity: &EntityDescriptor,
        paths: &[String],
    ) -> Result<Self> {
        let mut tree = IncludeTree::default();
        for path in paths {
            let resolved = metadata.resolve_navigation_path(entity, path)?;
            let mut node = &mut tree;
            for (property, _) in resolved {
                node = node.children.entry(property.name().to_string()).or_default();
            }
        }
        Ok(tree)
    }
}

/// In-memory data context.
///
/// Rows live in per-entity tables behind an async lock; pending changes live
/// in a change tracker until [`save_changes`](DataContext::save_changes).
/// Transactions copy the storage at begin and restore it on rollback.
pub struct MemoryContext {
    metadata: MetadataRegistry,
    options: RepositoryOptions,
    evaluators: EvaluatorRegistry,
    storage: RwLock<Storage>,
    tracker: Mutex<ChangeTracker>,
    transaction: Mutex<Option<Transaction>>,
    /// Highest integer key handed out or stored, per entity
    sequences: Mutex<HashMap<String, i64>>,
    soft_deletion_active: AtomicBool,
    current_user: Option<CurrentUserFn>,
}

pub struct MemoryContextBuilder {
    metadata: MetadataRegistry,
    options: RepositoryOptions,
    current_user: Option<CurrentUserFn>,
    soft_deletion_active: bool,
}

impl MemoryContextBuilder {
    pub fn options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn current_user<F>(mut self, current_user: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        self.current_user = Some(Arc::new(current_user));
        self
    }

    /// Initial value of the soft-deletion toggle (active by default).
    pub fn soft_deletion(mut self, active: bool) -> Self {
        self.soft_deletion_active = active;
        self
    }

    pub fn build(self) -> MemoryContext {
        MemoryContext {
            metadata: self.metadata,
            options: self.options,
            evaluators: EvaluatorRegistry::with_default_evaluators(),
            storage: RwLock::new(Storage::new()),
            tracker: Mutex::new(ChangeTracker::new()),
            transaction: Mutex::new(None),
            sequences: Mutex::new(HashMap::new()),
            soft_deletion_active: AtomicBool::new(self.soft_deletion_active),
            current_user: self.current_user,
        }
    }
}

impl MemoryContext {
    pub fn new(metadata: MetadataRegistry) -> Self {
        Self::builder(metadata).build()
    }

    pub fn builder(metadata: MetadataRegistry) -> MemoryContextBuilder {
        MemoryContextBuilder {
            metadata,
            options: RepositoryOptions::default(),
            current_user: None,
            soft_deletion_active: true,
        }
    }

    /// Inserts rows directly into storage, bypassing tracking and auditing.
    pub async fn seed<T: Entity>(&self, entities: impl IntoIterator<Item = T>) -> Result<usize> {
        let records = entities
            .into_iter()
            .map(|entity| to_record(&entity))
            .collect::<Result<Vec<_>>>()?;
        self.seed_records(T::NAME, records).await
    }

    pub async fn seed_records(&self, entity: &str, records: Vec<Record>) -> Result<usize> {
        let descriptor = self.metadata.get(entity)?;
        let mut storage = self.storage.write().await;

        let mut inserted = 0;
        for record in records {
            let row = scalar_row(&descriptor, &record);
            let key = descriptor.key_of(&row)?;
            storage.table_mut(descriptor.name()).insert(&descriptor, row)?;
            self.bump_sequence(descriptor.name(), &key)?;
            inserted += 1;
        }

        trace!("seeded {} row(s) into '{}'", inserted, entity);
        Ok(inserted)
    }

    /// Stored rows of an entity set, soft-deleted ones included.
    pub async fn rows(&self, entity: &str) -> Vec<Record> {
        self.storage.read().await.scan(entity).cloned().collect()
    }

    pub fn has_changes(&self) -> Result<bool> {
        Ok(self.tracker.lock()?.has_changes())
    }

    pub fn tracked_entries(&self) -> Result<Vec<TrackedEntry>> {
        Ok(self.tracker.lock()?.entries().to_vec())
    }

    fn bump_sequence(&self, entity: &str, key: &Value) -> Result<()> {
        if let Some(key) = key.as_i64() {
            let mut sequences = self.sequences.lock()?;
            let current = sequences.entry(entity.to_string()).or_insert(0);
            *current = (*current).max(key);
        }
        Ok(())
    }

    /// Generates a key for integer and uuid keys left at their default.
    fn assign_key(&self, entity: &EntityDescriptor, row: &mut Record) -> Result<Value> {
        let key_property = entity.require_property(entity.key())?;
        let current = row.get(entity.key()).cloned().unwrap_or(Value::Null);

        let generated = match (key_property.kind(), &current) {
            (PropertyKind::Scalar(ScalarType::Integer), Value::Null | Value::Integer(0)) => {
                let mut sequences = self.sequences.lock()?;
                let next = sequences.entry(entity.name().to_string()).or_insert(0);
                *next += 1;
                Some(Value::Integer(*next))
            }
            (PropertyKind::Scalar(ScalarType::Uuid), Value::Null) => {
                Some(Value::from(Uuid::new_v4()))
            }
            (PropertyKind::Scalar(ScalarType::Uuid), Value::Text(text))
                if text.parse::<Uuid>().is_ok_and(|u| u.is_nil()) =>
            {
                Some(Value::from(Uuid::new_v4()))
            }
            _ => None,
        };

        match generated {
            Some(key) => {
                row.insert(entity.key().to_string(), key.clone());
                Ok(key)
            }
            None => {
                let key = entity.key_of(row)?;
                self.bump_sequence(entity.name(), &key)?;
                Ok(key)
            }
        }
    }

    /// Fills every navigation of `row`: included ones from storage, the rest
    /// with an empty list or null.
    fn materialize(
        &self,
        navigator: &StorageNavigator<'_>,
        entity: &EntityDescriptor,
        mut row: Record,
        includes: &IncludeTree,
        include_deleted: bool,
    ) -> Result<Record> {
        for navigation in entity.navigations() {
            let value = match includes.children.get(navigation.name()) {
                Some(subtree) => {
                    let target = self.metadata.navigation_target(navigation)?;
                    let mut items = Vec::new();
                    for related in navigator.related(entity, &row, navigation)? {
                        if !include_deleted && target.is_soft_deletable() && is_deleted(&related) {
                            continue;
                        }
                        let related = self.materialize(
                            navigator,
                            &target,
                            related,
                            subtree,
                            include_deleted,
                        )?;
                        items.push(Value::Object(related));
                    }
                    if navigation.is_collection() {
                        Value::List(items)
                    } else {
                        items.pop().unwrap_or(Value::Null)
                    }
                }
                None if navigation.is_collection() => Value::List(Vec::new()),
                None => Value::Null,
            };
            row.insert(navigation.name().to_string(), value);
        }
        Ok(row)
    }

    /// Matching rows of the request, ordered and paged.
    fn select_rows(
        &self,
        storage: &Storage,
        entity: &Arc<EntityDescriptor>,
        request: &FetchRequest,
    ) -> Result<Vec<Record>> {
        let navigator = StorageNavigator::new(storage, &self.metadata);
        let evaluation = EvaluationContext::new(&self.evaluators, &self.metadata, &navigator);

        let mut rows = Vec::new();
        for row in storage.scan(entity.name()) {
            let scope = Scope::entity(row, entity.clone());
            if evaluation.matches(request.predicate.as_ref(), &scope)? {
                rows.push(row.clone());
            }
        }

        validate_order_by(entity, &request.order_by)?;
        sort_records(&mut rows, &request.order_by)?;
        Ok(apply_paging(rows, request.skip, request.take))
    }

    fn attach_untracked(&self, entity: &EntityDescriptor, records: &[Record]) -> Result<()> {
        let mut tracker = self.tracker.lock()?;
        for record in records {
            let key = entity.key_of(record)?;
            if tracker.find(entity.name(), &key).is_none() {
                tracker.track(TrackedEntry::new(
                    entity.name(),
                    key,
                    scalar_row(entity, record),
                    EntryState::Unchanged,
                ))?;
            }
        }
        Ok(())
    }

    fn stamp_transaction(&self, capabilities: &Capabilities, row: &mut Record) {
        if capabilities.transaction_id
            && let Some(id) = self.current_transaction()
        {
            row.insert(names::TRANSACTION_ID.to_string(), id.to_value());
        }
    }

    fn stamp_modification(
        &self,
        capabilities: &Capabilities,
        row: &mut Record,
        now: &Value,
        user: &Option<String>,
    ) {
        if capabilities.modification_date && self.options.audit_modification_date {
            row.insert(names::LAST_MODIFICATION_DATE.to_string(), now.clone());
        }
        if capabilities.modifier_user_name
            && self.options.audit_modifier
            && let Some(user) = user
        {
            row.insert(names::LAST_MODIFIER_USER_NAME.to_string(), Value::Text(user.clone()));
        }
    }

    fn stamp_deletion(
        &self,
        capabilities: &Capabilities,
        row: &mut Record,
        now: &Value,
        user: &Option<String>,
    ) {
        row.insert(names::IS_DELETED.to_string(), Value::Boolean(true));
        if capabilities.deletion_date && self.options.audit_deletion_date {
            row.insert(names::DELETION_DATE.to_string(), now.clone());
        }
        if capabilities.deleter_user_name
            && self.options.audit_deleter
            && let Some(user) = user
        {
            row.insert(names::DELETER_USER_NAME.to_string(), Value::Text(user.clone()));
        }
    }

    /// Writes all pending tracker entries into `storage`.
    ///
    /// Changes are applied to a copy that replaces `storage` only when every
    /// entry succeeded, so a failed save leaves storage and tracker untouched.
    fn apply_pending(&self, storage: &mut Storage) -> Result<usize> {
        let mut tracker = self.tracker.lock()?;
        let pending: Vec<TrackedEntry> = tracker.pending().cloned().collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let mut working = storage.clone();
        let now = Value::now();
        let user = self.current_user_name();
        let soft_deletion = self.is_soft_deletion_active();

        let mut stored = Vec::with_capacity(pending.len());
        for entry in pending {
            let entity = self.metadata.get(&entry.entity)?;
            let capabilities = entity.capabilities();

            match entry.state {
                EntryState::Added => {
                    let mut row = entry.record.clone();
                    if capabilities.creation_date {
                        row.insert(names::CREATION_DATE.to_string(), now.clone());
                    }
                    if capabilities.creator_user_name
                        && let Some(user) = &user
                    {
                        row.insert(names::CREATOR_USER_NAME.to_string(), Value::Text(user.clone()));
                    }
                    self.stamp_transaction(&capabilities, &mut row);

                    working.table_mut(entity.name()).insert(&entity, row.clone())?;
                    self.bump_sequence(entity.name(), &entry.key)?;
                    stored.push((entry.entity, entry.key, Some(row)));
                }

                EntryState::Modified => {
                    let row = existing_row(&mut working, &entity, &entry.key)?;
                    for property in &entry.modified_properties {
                        let value = entry.record.get(property).cloned().unwrap_or(Value::Null);
                        row.insert(property.clone(), value);
                    }
                    self.stamp_modification(&capabilities, row, &now, &user);
                    self.stamp_transaction(&capabilities, row);

                    let row = row.clone();
                    stored.push((entry.entity, entry.key, Some(row)));
                }

                EntryState::Deleted if soft_deletion && capabilities.soft_delete => {
                    let row = existing_row(&mut working, &entity, &entry.key)?;
                    self.stamp_deletion(&capabilities, row, &now, &user);
                    self.stamp_transaction(&capabilities, row);

                    let row = row.clone();
                    stored.push((entry.entity, entry.key, Some(row)));
                }

                EntryState::Deleted => {
                    existing_row(&mut working, &entity, &entry.key)?;
                    working.table_mut(entity.name()).remove(&entry.key);
                    stored.push((entry.entity, entry.key, None));
                }

                EntryState::Unchanged => continue,
            }
        }

        let affected = stored.len();
        *storage = working;
        tracker.accept_changes(stored);

        debug!("save_changes wrote {} row(s)", affected);
        Ok(affected)
    }

    fn validate_assignments(
        &self,
        entity: &EntityDescriptor,
        assignments: &[Assignment],
    ) -> Result<()> {
        for assignment in assignments {
            let property = entity.require_property(&assignment.property)?;
            if property.is_navigation() {
                return Err(RepoError::Developer(format!(
                    "Cannot assign navigation property '{}.{}'",
                    entity.name(),
                    assignment.property
                )));
            }
            if assignment.property == entity.key() {
                return Err(RepoError::Developer(format!(
                    "Cannot assign key property '{}.{}'",
                    entity.name(),
                    assignment.property
                )));
            }
        }
        Ok(())
    }
}

fn is_deleted(row: &Record) -> bool {
    row.get(names::IS_DELETED).is_some_and(Value::as_bool)
}

fn existing_row<'s>(
    storage: &'s mut Storage,
    entity: &EntityDescriptor,
    key: &Value,
) -> Result<&'s mut Record> {
    storage.table_mut(entity.name()).get_mut(key).ok_or_else(|| {
        RepoError::ExecutionError(format!(
            "Entity '{}' with key {} no longer exists in storage",
            entity.name(),
            key
        ))
    })
}

#[async_trait]
impl DataContext for MemoryContext {
    fn metadata(&self) -> &MetadataRegistry {
        &self.metadata
    }

    fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    fn evaluators(&self) -> &EvaluatorRegistry {
        &self.evaluators
    }

    async fn fetch(&self, request: FetchRequest) -> Result<Vec<Record>> {
        let entity = self.metadata.get(&request.entity)?;
        let includes = IncludeTree::build(&self.metadata, &entity, &request.includes)?;

        let records = {
            let storage = self.storage.read().await;
            let rows = self.select_rows(&storage, &entity, &request)?;

            let navigator = StorageNavigator::new(&storage, &self.metadata);
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                records.push(self.materialize(
                    &navigator,
                    &entity,
                    row,
                    &includes,
                    request.include_deleted_navigations,
                )?);
            }
            records
        };

        if request.tracking {
            self.attach_untracked(&entity, &records)?;
        }

        trace!("fetched {} '{}' row(s)", records.len(), entity.name());
        Ok(records)
    }

    async fn project(&self, request: FetchRequest, projection: &Expr) -> Result<Vec<Value>> {
        let entity = self.metadata.get(&request.entity)?;
        let storage = self.storage.read().await;
        let rows = self.select_rows(&storage, &entity, &request)?;

        let navigator = StorageNavigator::new(&storage, &self.metadata);
        let evaluation = EvaluationContext::new(&self.evaluators, &self.metadata, &navigator);

        rows.iter()
            .map(|row| evaluation.evaluate(projection, &Scope::entity(row, entity.clone())))
            .collect()
    }

    async fn count(&self, entity: &str, predicate: Option<&Expr>) -> Result<usize> {
        let entity = self.metadata.get(entity)?;
        let storage = self.storage.read().await;

        let navigator = StorageNavigator::new(&storage, &self.metadata);
        let evaluation = EvaluationContext::new(&self.evaluators, &self.metadata, &navigator);

        let mut count = 0;
        for row in storage.scan(entity.name()) {
            if evaluation.matches(predicate, &Scope::entity(row, entity.clone()))? {
                count += 1;
            }
        }
        Ok(count)
    }

    fn find_tracked(&self, entity: &str, key: &Value) -> Result<Option<TrackedEntry>> {
        Ok(self.tracker.lock()?.find(entity, key).cloned())
    }

    fn detach(&self, entity: &str, key: &Value) -> Result<bool> {
        Ok(self.tracker.lock()?.detach(entity, key).is_some())
    }

    fn attach(&self, entity: &str, record: Record) -> Result<()> {
        let entity = self.metadata.get(entity)?;
        let row = scalar_row(&entity, &record);
        let key = entity.key_of(&row)?;

        self.tracker
            .lock()?
            .track(TrackedEntry::new(entity.name(), key, row, EntryState::Unchanged))
    }

    fn add(&self, entity: &str, mut record: Record) -> Result<Record> {
        let entity = self.metadata.get(entity)?;
        let mut row = scalar_row(&entity, &record);
        let key = self.assign_key(&entity, &mut row)?;
        record.insert(entity.key().to_string(), key.clone());

        self.tracker
            .lock()?
            .track(TrackedEntry::new(entity.name(), key, row, EntryState::Added))?;
        Ok(record)
    }

    fn update(&self, entity: &str, record: Record) -> Result<()> {
        let entity = self.metadata.get(entity)?;
        let row = scalar_row(&entity, &record);
        let key = entity.key_of(&row)?;
        let modified = entity
            .scalar_properties()
            .map(|p| p.name().to_string())
            .filter(|name| name != entity.key())
            .collect();

        let mut tracker = self.tracker.lock()?;
        match tracker.find_mut(entity.name(), &key) {
            Some(entry) => {
                entry.record = row;
                if entry.state != EntryState::Added {
                    entry.state = EntryState::Modified;
                    entry.modified_properties = modified;
                }
                Ok(())
            }
            None => {
                let mut entry = TrackedEntry::new(entity.name(), key, row, EntryState::Modified);
                entry.modified_properties = modified;
                tracker.track(entry)
            }
        }
    }

    fn update_properties(&self, entity: &str, record: Record, properties: &[String]) -> Result<()> {
        let entity = self.metadata.get(entity)?;
        for property in properties {
            let descriptor = entity.require_property(property)?;
            if descriptor.is_navigation() || property == entity.key() {
                return Err(RepoError::Developer(format!(
                    "Property '{}.{}' cannot be updated individually",
                    entity.name(),
                    property
                )));
            }
        }

        let row = scalar_row(&entity, &record);
        let key = entity.key_of(&row)?;

        let mut tracker = self.tracker.lock()?;
        match tracker.find_mut(entity.name(), &key) {
            Some(entry) => {
                for property in properties {
                    let value = row.get(property).cloned().unwrap_or(Value::Null);
                    entry.record.insert(property.clone(), value);
                    if entry.state != EntryState::Added {
                        entry.modified_properties.insert(property.clone());
                    }
                }
                if entry.state == EntryState::Unchanged && !properties.is_empty() {
                    entry.state = EntryState::Modified;
                }
                Ok(())
            }
            None => {
                let state = if properties.is_empty() {
                    EntryState::Unchanged
                } else {
                    EntryState::Modified
                };
                let mut entry = TrackedEntry::new(entity.name(), key, row, state);
                entry.modified_properties = properties.iter().cloned().collect();
                tracker.track(entry)
            }
        }
    }

    fn remove(&self, entity: &str, record: Record) -> Result<()> {
        let entity = self.metadata.get(entity)?;
        let row = scalar_row(&entity, &record);
        let key = entity.key_of(&row)?;

        let mut tracker = self.tracker.lock()?;
        let tracked_state = tracker.find(entity.name(), &key).map(|entry| entry.state);
        match tracked_state {
            // Never saved, nothing to delete
            Some(EntryState::Added) => {
                tracker.detach(entity.name(), &key);
                Ok(())
            }
            Some(_) => {
                if let Some(entry) = tracker.find_mut(entity.name(), &key) {
                    entry.state = EntryState::Deleted;
                    entry.modified_properties.clear();
                }
                Ok(())
            }
            None => tracker.track(TrackedEntry::new(entity.name(), key, row, EntryState::Deleted)),
        }
    }

    async fn save_changes(&self) -> Result<usize> {
        let mut storage = self.storage.write().await;
        self.apply_pending(&mut storage)
    }

    async fn execute_update(
        &self,
        entity: &str,
        predicate: Option<&Expr>,
        assignments: &[Assignment],
    ) -> Result<usize> {
        let entity = self.metadata.get(entity)?;
        self.validate_assignments(&entity, assignments)?;
        let capabilities = entity.capabilities();

        let mut storage = self.storage.write().await;

        // Every new value is computed before anything is written
        let updates = {
            let navigator = StorageNavigator::new(&storage, &self.metadata);
            let evaluation = EvaluationContext::new(&self.evaluators, &self.metadata, &navigator);

            let mut updates = Vec::new();
            for row in storage.scan(entity.name()) {
                let scope = Scope::entity(row, entity.clone());
                if !evaluation.matches(predicate, &scope)? {
                    continue;
                }
                let mut values = Vec::with_capacity(assignments.len());
                for assignment in assignments {
                    let value = evaluation.evaluate(&assignment.value, &scope)?;
                    values.push((assignment.property.clone(), value));
                }
                updates.push((entity.key_of(row)?, values));
            }
            updates
        };

        let table = storage.table_mut(entity.name());
        for (key, values) in &updates {
            if let Some(row) = table.get_mut(key) {
                for (property, value) in values {
                    row.insert(property.clone(), value.clone());
                }
                self.stamp_transaction(&capabilities, row);
            }
        }

        debug!("execute_update on '{}' affected {} row(s)", entity.name(), updates.len());
        Ok(updates.len())
    }

    async fn execute_delete(&self, entity: &str, predicate: Option<&Expr>) -> Result<usize> {
        let entity = self.metadata.get(entity)?;
        let mut storage = self.storage.write().await;

        let keys = {
            let navigator = StorageNavigator::new(&storage, &self.metadata);
            let evaluation = EvaluationContext::new(&self.evaluators, &self.metadata, &navigator);

            let mut keys = Vec::new();
            for row in storage.scan(entity.name()) {
                if evaluation.matches(predicate, &Scope::entity(row, entity.clone()))? {
                    keys.push(entity.key_of(row)?);
                }
            }
            keys
        };

        let table = storage.table_mut(entity.name());
        for key in &keys {
            table.remove(key);
        }

        debug!("execute_delete on '{}' removed {} row(s)", entity.name(), keys.len());
        Ok(keys.len())
    }

    fn is_soft_deletion_active(&self) -> bool {
        self.soft_deletion_active.load(Ordering::SeqCst)
    }

    fn set_soft_deletion_active(&self, active: bool) {
        self.soft_deletion_active.store(active, Ordering::SeqCst);
    }

    fn current_user_name(&self) -> Option<String> {
        self.current_user.as_ref().and_then(|current_user| current_user())
    }

    async fn begin_transaction(&self) -> Result<TransactionId> {
        let storage = self.storage.write().await;
        let mut slot = self.transaction.lock()?;

        if let Some(active) = slot.as_ref().filter(|txn| txn.state().is_active()) {
            return Err(RepoError::TransactionError(format!(
                "Transaction {} is already in progress",
                active.id()
            )));
        }

        let id = TransactionId::new();
        *slot = Some(Transaction::new(id, storage.clone()));
        debug!("began transaction {}", id);
        Ok(id)
    }

    async fn commit_transaction(&self) -> Result<()> {
        let mut slot = self.transaction.lock()?;
        let Some(mut txn) = slot.take() else {
            return Err(RepoError::TransactionError("No transaction is in progress".into()));
        };

        txn.commit()?;
        debug!("committed transaction {} after {:?}", txn.id(), txn.duration());
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let mut storage = self.storage.write().await;

        let (id, snapshot) = {
            let mut slot = self.transaction.lock()?;
            let Some(mut txn) = slot.take() else {
                return Err(RepoError::TransactionError("No transaction is in progress".into()));
            };
            (txn.id(), txn.rollback()?)
        };

        *storage = snapshot;
        // Tracked state no longer matches storage
        self.tracker.lock()?.clear();

        debug!("rolled back transaction {}", id);
        Ok(())
    }

    fn current_transaction(&self) -> Option<TransactionId> {
        self.transaction
            .lock()
            .ok()
            .and_then(|slot| {
                slot.as_ref()
                    .filter(|txn| txn.state().is_active())
                    .map(|txn| txn.id())
            })
    }
}
