use std::collections::BTreeSet;
use std::fmt;

use crate::core::{Record, RepoError, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Loaded or attached, no pending change
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Unchanged => write!(f, "UNCHANGED"),
            EntryState::Added => write!(f, "ADDED"),
            EntryState::Modified => write!(f, "MODIFIED"),
            EntryState::Deleted => write!(f, "DELETED"),
        }
    }
}

/// One tracked entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntry {
    pub entity: String,
    pub key: Value,
    pub record: Record,
    pub state: EntryState,
    /// Properties written on save for `Modified` entries
    pub modified_properties: BTreeSet<String>,
}

impl TrackedEntry {
    pub fn new(entity: impl Into<String>, key: Value, record: Record, state: EntryState) -> Self {
        Self {
            entity: entity.into(),
            key,
            record,
            state,
            modified_properties: BTreeSet::new(),
        }
    }

    pub fn is_property_modified(&self, property: &str) -> bool {
        self.modified_properties.contains(property)
    }

    pub fn has_pending_change(&self) -> bool {
        self.state != EntryState::Unchanged
    }
}

/// Identity map of tracked entities, in tracking order.
///
/// Keys are unique per entity name; tracking a second instance with the same
/// key is an error, which is why commands detach before they attach.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, entity: &str, key: &Value) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.entity == entity && entry.key == *key)
    }

    pub fn find(&self, entity: &str, key: &Value) -> Option<&TrackedEntry> {
        self.position(entity, key).map(|idx| &self.entries[idx])
    }

    pub fn find_mut(&mut self, entity: &str, key: &Value) -> Option<&mut TrackedEntry> {
        match self.position(entity, key) {
            Some(idx) => Some(&mut self.entries[idx]),
            None => None,
        }
    }

    pub fn track(&mut self, entry: TrackedEntry) -> Result<()> {
        if self.position(&entry.entity, &entry.key).is_some() {
            return Err(RepoError::AlreadyTracked {
                entity: entry.entity,
                key: entry.key.to_string(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn detach(&mut self, entity: &str, key: &Value) -> Option<TrackedEntry> {
        self.position(entity, key).map(|idx| self.entries.remove(idx))
    }

    pub fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackedEntry> {
        self.entries.iter().filter(|entry| entry.has_pending_change())
    }

    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Applies the outcome of a successful save: written rows become
    /// `Unchanged` with their stored values, hard-deleted rows are dropped.
    pub fn accept_changes(&mut self, stored: Vec<(String, Value, Option<Record>)>) {
        for (entity, key, row) in stored {
            match row {
                Some(row) => {
                    if let Some(entry) = self.find_mut(&entity, &key) {
                        entry.record = row;
                        entry.state = EntryState::Unchanged;
                        entry.modified_properties.clear();
                    }
                }
                None => {
                    self.detach(&entity, &key);
                }
            }
        }
    }
}
