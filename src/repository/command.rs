use log::{debug, trace};

use super::Repository;
use super::set_property::SetPropertyBuilder;
use crate::context::{DataContext, EntryState};
use crate::core::{Record, Result, Value};
use crate::expression::Expr;
use crate::metadata::{Entity, EntityDescriptor, from_record, to_record};
use crate::query::QueryOptions;

impl<T: Entity, C: DataContext + ?Sized> Repository<T, C> {
    /// Stops tracking the entity with the same key, if one is tracked.
    ///
    /// Returns the state the detached entry had. Records without a key value
    /// are skipped.
    pub fn detach_from_local_if_exists(
        &self,
        entity: &EntityDescriptor,
        record: &Record,
    ) -> Result<Option<EntryState>> {
        let key = match record.get(entity.key()) {
            Some(Value::Null) | None => return Ok(None),
            Some(key) => key.clone(),
        };

        match self.context.find_tracked(entity.name(), &key)? {
            Some(entry) => {
                self.context.detach(entity.name(), &key)?;
                trace!("detached tracked '{}' {} ({:?})", entity.name(), key, entry.state);
                Ok(Some(entry.state))
            }
            None => Ok(None),
        }
    }

    /// Commits only under the save-every-operation policy; 0 otherwise.
    async fn internal_save_changes(&self) -> Result<usize> {
        if self.save_changes_after_every_operation {
            self.context.save_changes().await
        } else {
            Ok(0)
        }
    }

    /// Merges the tracked scalar values (assigned key, audit stamps) back into `record`.
    fn refresh(&self, mut record: Record) -> Result<T> {
        let key = self.entity.key_of(&record)?;
        if let Some(entry) = self.context.find_tracked(self.entity.name(), &key)? {
            record.extend(entry.record);
        }
        from_record(record)
    }

    fn stage_add(&self, entity: &T) -> Result<Record> {
        let record = to_record(entity)?;
        self.detach_from_local_if_exists(&self.entity, &record)?;
        self.context.add(self.entity.name(), record)
    }

    fn stage_update(&self, record: Record, properties: Option<&[String]>) -> Result<()> {
        let name = self.entity.name();
        match self.detach_from_local_if_exists(&self.entity, &record)? {
            // Not stored yet: stays an insert
            Some(EntryState::Added) => self.context.add(name, record).map(|_| ()),
            _ => match properties {
                Some(properties) => self.context.update_properties(name, record, properties),
                None => self.context.update(name, record),
            },
        }
    }

    /// Stages the deletion of `record` and of every child materialized on its
    /// cascade navigations.
    fn stage_removal(&self, entity: &EntityDescriptor, record: Record) -> Result<()> {
        for navigation in entity.navigations().filter(|n| n.is_cascade()) {
            let children: Vec<Record> = match record.get(navigation.name()) {
                Some(Value::List(items)) => {
                    items.iter().filter_map(|v| v.as_object().cloned()).collect()
                }
                Some(Value::Object(child)) => vec![child.clone()],
                _ => continue,
            };
            if children.is_empty() {
                continue;
            }

            let target = self.context.metadata().navigation_target(navigation)?;
            trace!(
                "cascading delete through '{}.{}' to {} row(s)",
                entity.name(),
                navigation.name(),
                children.len()
            );
            for child in children {
                self.stage_removal(&target, child)?;
            }
        }

        match self.detach_from_local_if_exists(entity, &record)? {
            // Never stored, dropping the entry is the whole delete
            Some(EntryState::Added) => Ok(()),
            _ => self.context.remove(entity.name(), record),
        }
    }

    /// Adds the entity and returns it with its key and creation stamps.
    pub async fn add(&self, entity: T) -> Result<T> {
        let staged = self.stage_add(&entity)?;
        self.internal_save_changes().await?;
        self.refresh(staged)
    }

    pub async fn add_range(&self, entities: Vec<T>) -> Result<Vec<T>> {
        let staged = entities
            .iter()
            .map(|entity| self.stage_add(entity))
            .collect::<Result<Vec<_>>>()?;
        self.internal_save_changes().await?;
        staged.into_iter().map(|record| self.refresh(record)).collect()
    }

    /// Whole-entity update: every scalar property is written.
    pub async fn update(&self, entity: &T) -> Result<usize> {
        self.stage_update(to_record(entity)?, None)?;
        self.internal_save_changes().await
    }

    pub async fn update_range(&self, entities: &[T]) -> Result<usize> {
        for entity in entities {
            self.stage_update(to_record(entity)?, None)?;
        }
        self.internal_save_changes().await
    }

    /// Writes only `properties`; every other column keeps its stored value.
    pub async fn update_properties(&self, entity: &T, properties: &[&str]) -> Result<usize> {
        let properties: Vec<String> = properties.iter().map(|p| p.to_string()).collect();
        self.stage_update(to_record(entity)?, Some(&properties))?;
        self.internal_save_changes().await
    }

    /// Deletes the entity and the children loaded on its cascade navigations.
    ///
    /// Soft-deletable rows are flagged instead of removed while the context's
    /// soft deletion is active.
    pub async fn delete(&self, entity: &T) -> Result<usize> {
        self.stage_removal(&self.entity, to_record(entity)?)?;
        self.internal_save_changes().await
    }

    pub async fn delete_range(&self, entities: &[T]) -> Result<usize> {
        for entity in entities {
            self.stage_removal(&self.entity, to_record(entity)?)?;
        }
        self.internal_save_changes().await
    }

    /// Deletes `olds` and adds `news` in one save.
    pub async fn replace_olds_with_news(&self, olds: &[T], news: Vec<T>) -> Result<usize> {
        for old in olds {
            self.stage_removal(&self.entity, to_record(old)?)?;
        }
        for new in &news {
            self.stage_add(new)?;
        }
        self.internal_save_changes().await
    }

    /// Deletes every entity matching `predicate` under the current fetch state.
    pub async fn remove_all(&mut self, predicate: Option<Expr>) -> Result<usize> {
        let mut options = QueryOptions::new();
        options.predicate = predicate;

        let records = self.get_records(options).await?;
        debug!("remove_all staging {} '{}' row(s)", records.len(), self.entity.name());
        for record in records {
            self.stage_removal(&self.entity, record)?;
        }
        self.internal_save_changes().await
    }

    /// Set-based update of the rows matching `predicate`, bypassing the change
    /// tracker. Modification audit columns are appended unless the builder
    /// says they were handled.
    pub async fn execute_update(
        &self,
        predicate: Option<Expr>,
        mut builder: SetPropertyBuilder,
    ) -> Result<usize> {
        if !builder.audit_calls_added() {
            let user = self.context.current_user_name();
            builder.append_modification_audit(
                &self.entity,
                self.context.options(),
                &Value::now(),
                user.as_deref(),
            );
        }

        self.context
            .execute_update(self.entity.name(), predicate.as_ref(), builder.assignments())
            .await
    }

    /// Set-based delete of the rows matching `predicate`.
    ///
    /// While soft deletion is active and the entity is soft-deletable this is
    /// an update of `IsDeleted` and the deletion audit columns, combined with
    /// the assignments of `builder`; otherwise rows are physically removed.
    pub async fn execute_delete(
        &self,
        predicate: Option<Expr>,
        builder: Option<SetPropertyBuilder>,
    ) -> Result<usize> {
        if self.context.is_soft_deletion_active() && self.entity.is_soft_deletable() {
            let mut builder = builder.unwrap_or_default();
            let user = self.context.current_user_name();
            builder.append_soft_delete(
                &self.entity,
                self.context.options(),
                &Value::now(),
                user.as_deref(),
            );

            debug!("execute_delete on '{}' rewritten as soft delete", self.entity.name());
            return self
                .context
                .execute_update(self.entity.name(), predicate.as_ref(), builder.assignments())
                .await;
        }

        self.context
            .execute_delete(self.entity.name(), predicate.as_ref())
            .await
    }

    /// Commits all staged work, whatever the save policy.
    pub async fn save_changes(&self) -> Result<usize> {
        self.context.save_changes().await
    }
}
