// ============================================================================
// In-Memory Storage
// ============================================================================
//
// One `Table` per entity set. Rows hold scalar properties only; related rows
// live in their own tables and are reached through foreign keys.
//
// ============================================================================

pub mod table;

pub use table::Table;

use std::collections::HashMap;

use crate::core::{Record, RepoError, Result, Value};
use crate::evaluator::Navigator;
use crate::metadata::{EntityDescriptor, MetadataRegistry, PropertyDescriptor, PropertyKind};

#[derive(Debug, Clone, Default)]
pub struct Storage {
    tables: HashMap<String, Table>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, entity: &str) -> Option<&Table> {
        self.tables.get(entity)
    }

    pub fn table_mut(&mut self, entity: &str) -> &mut Table {
        self.tables.entry(entity.to_string()).or_default()
    }

    pub fn scan(&self, entity: &str) -> impl Iterator<Item = &Record> {
        self.tables.get(entity).into_iter().flat_map(Table::scan)
    }
}

/// Keeps only the scalar properties the entity declares.
pub fn scalar_row(entity: &EntityDescriptor, record: &Record) -> Record {
    entity
        .scalar_properties()
        .map(|property| {
            let value = record.get(property.name()).cloned().unwrap_or(Value::Null);
            (property.name().to_string(), value)
        })
        .collect()
}

/// Resolves navigations by foreign key against a storage snapshot.
pub struct StorageNavigator<'a> {
    storage: &'a Storage,
    metadata: &'a MetadataRegistry,
}

impl<'a> StorageNavigator<'a> {
    pub fn new(storage: &'a Storage, metadata: &'a MetadataRegistry) -> Self {
        Self { storage, metadata }
    }

    /// Related rows of a navigation, as stored (no soft-delete filtering).
    pub fn related(
        &self,
        owner: &EntityDescriptor,
        record: &Record,
        navigation: &PropertyDescriptor,
    ) -> Result<Vec<Record>> {
        match navigation.kind() {
            PropertyKind::Collection { target, foreign_key } => {
                let key = owner.key_of(record)?;
                Ok(self
                    .storage
                    .scan(target)
                    .filter(|row| row.get(foreign_key) == Some(&key))
                    .cloned()
                    .collect())
            }
            PropertyKind::Reference { target, foreign_key } => {
                let target_entity = self.metadata.get(target)?;
                let row = match record.get(foreign_key) {
                    Some(Value::Null) | None => None,
                    Some(fk) => self
                        .storage
                        .table(target_entity.name())
                        .and_then(|table| table.get(fk))
                        .cloned(),
                };
                Ok(row.into_iter().collect())
            }
            PropertyKind::Scalar(_) => Err(RepoError::Developer(format!(
                "Property '{}.{}' is not a navigation",
                owner.name(),
                navigation.name()
            ))),
        }
    }
}

impl Navigator for StorageNavigator<'_> {
    fn navigate(
        &self,
        owner: &EntityDescriptor,
        record: &Record,
        navigation: &PropertyDescriptor,
    ) -> Result<Value> {
        let mut related = self.related(owner, record, navigation)?;
        if navigation.is_collection() {
            Ok(Value::List(related.into_iter().map(Value::Object).collect()))
        } else {
            Ok(related.pop().map(Value::Object).unwrap_or(Value::Null))
        }
    }
}
