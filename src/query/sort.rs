// ============================================================================
// Record Sorting
// ============================================================================
//
// - Multi-key sorting, compared key by key
// - Stable sort (equal records keep their relative order)
// - NULLS LAST for ascending keys, NULLS FIRST for descending keys
// - The first comparison error is reported instead of being swallowed
//
// ============================================================================

use std::cmp::Ordering;

use serde::Deserialize;

use crate::core::{Record, RepoError, Result, Value};
use crate::metadata::EntityDescriptor;

/// Strategy for handling NULL values during sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

impl NullOrdering {
    pub fn default_for_direction(descending: bool) -> Self {
        if descending {
            Self::NullsFirst
        } else {
            Self::NullsLast
        }
    }
}

/// One ordering key of a query: `{ "property": "Total", "descending": true }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBy {
    pub property: String,
    #[serde(default)]
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: false,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            descending: true,
        }
    }

    pub fn null_ordering(&self) -> NullOrdering {
        NullOrdering::default_for_direction(self.descending)
    }
}

/// Checks that every ordering key names a scalar property of `entity`.
pub fn validate_order_by(entity: &EntityDescriptor, keys: &[OrderBy]) -> Result<()> {
    for key in keys {
        let property = entity.require_property(&key.property)?;
        if property.is_navigation() {
            return Err(RepoError::Developer(format!(
                "Cannot order by navigation property '{}.{}'",
                entity.name(),
                key.property
            )));
        }
    }
    Ok(())
}

/// Compares records by a list of ordering keys.
pub struct RecordComparator<'a> {
    keys: &'a [OrderBy],
}

impl<'a> RecordComparator<'a> {
    pub fn new(keys: &'a [OrderBy]) -> Self {
        Self { keys }
    }

    pub fn compare(&self, left: &Record, right: &Record) -> Result<Ordering> {
        for key in self.keys {
            let ordering = self.compare_by_key(left, right, key)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }

    fn compare_by_key(&self, left: &Record, right: &Record, key: &OrderBy) -> Result<Ordering> {
        let null = Value::Null;
        let value1 = left.get(&key.property).unwrap_or(&null);
        let value2 = right.get(&key.property).unwrap_or(&null);

        let ordering = match (value1.is_null(), value2.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => match key.null_ordering() {
                NullOrdering::NullsFirst => return Ok(Ordering::Less),
                NullOrdering::NullsLast => return Ok(Ordering::Greater),
            },
            (false, true) => match key.null_ordering() {
                NullOrdering::NullsFirst => return Ok(Ordering::Greater),
                NullOrdering::NullsLast => return Ok(Ordering::Less),
            },
            (false, false) => value1.compare(value2)?,
        };

        Ok(if key.descending {
            ordering.reverse()
        } else {
            ordering
        })
    }
}

/// Sorts records in place.
pub fn sort_records(records: &mut [Record], keys: &[OrderBy]) -> Result<()> {
    if records.len() < 2 || keys.is_empty() {
        return Ok(());
    }

    let comparator = RecordComparator::new(keys);
    let mut first_error = None;

    records.sort_by(|left, right| match comparator.compare(left, right) {
        Ok(ordering) => ordering,
        Err(err) => {
            first_error.get_or_insert(err);
            Ordering::Equal
        }
    });

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
