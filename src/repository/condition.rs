//! Predicate composition: key equality AND soft-delete filter AND caller
//! predicate. Every clause is optional except the key; combining with an
//! absent clause returns the other one unchanged.

use super::fetch_state::FetchSnapshot;
use crate::core::Value;
use crate::expression::{Expr, and_also};
use crate::metadata::{EntityDescriptor, names};

/// `IsDeleted == false`, when the entity is soft-deletable and the snapshot
/// excludes deleted rows.
pub fn soft_delete_clause(entity: &EntityDescriptor, snapshot: FetchSnapshot) -> Option<Expr> {
    if snapshot.excludes_deleted() && entity.is_soft_deletable() {
        Some(Expr::prop(names::IS_DELETED).eq(false))
    } else {
        None
    }
}

pub fn compose_condition(
    entity: &EntityDescriptor,
    snapshot: FetchSnapshot,
    predicate: Option<Expr>,
) -> Option<Expr> {
    and_also(soft_delete_clause(entity, snapshot), predicate)
}

/// Key equality through dynamic `Equals`, so keys of any type can be matched.
pub fn key_equality(entity: &EntityDescriptor, key: Value) -> Expr {
    Expr::prop(entity.key()).equals(Expr::Literal(key))
}

pub fn compose_key_condition(
    entity: &EntityDescriptor,
    snapshot: FetchSnapshot,
    key: Value,
    predicate: Option<Expr>,
) -> Expr {
    let key_clause = key_equality(entity, key);
    match compose_condition(entity, snapshot, predicate) {
        Some(rest) => key_clause.and(rest),
        None => key_clause,
    }
}
