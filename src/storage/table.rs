use std::collections::{BTreeMap, HashMap};

use crate::core::{Record, RepoError, Result, Value};
use crate::metadata::EntityDescriptor;

/// Rows of one entity set, in insertion order, indexed by key.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: BTreeMap<usize, Record>,
    next_row_id: usize,
    key_index: HashMap<Value, usize>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: &EntityDescriptor, row: Record) -> Result<()> {
        let key = entity.key_of(&row)?;
        if self.key_index.contains_key(&key) {
            return Err(RepoError::DuplicateKey {
                entity: entity.name().to_string(),
                key: key.to_string(),
            });
        }

        let id = self.next_row_id;
        self.next_row_id += 1;

        self.rows.insert(id, row);
        self.key_index.insert(key, id);
        Ok(())
    }

    pub fn get(&self, key: &Value) -> Option<&Record> {
        self.key_index.get(key).and_then(|id| self.rows.get(id))
    }

    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Record> {
        match self.key_index.get(key) {
            Some(id) => self.rows.get_mut(id),
            None => None,
        }
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.key_index.contains_key(key)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Record> {
        let id = self.key_index.remove(key)?;
        self.rows.remove(&id)
    }

    pub fn scan(&self) -> impl Iterator<Item = &Record> {
        self.rows.values()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Largest integer key, used to continue generated key sequences.
    pub fn max_integer_key(&self) -> i64 {
        self.key_index
            .keys()
            .filter_map(Value::as_i64)
            .max()
            .unwrap_or(0)
    }
}
