//! Discovery of the navigation paths to load before deleting an entity.
//!
//! Only navigations marked `cascade` are followed, and recursion continues
//! through collections only. Cycles are bounded by the depth limit alone, so a
//! self-referencing cascade yields one path per level up to that limit.

use std::sync::Arc;

use log::debug;

use crate::core::Result;
use crate::metadata::{EntityDescriptor, MetadataRegistry};

/// Cascade include paths of `entity`, memoized per entity and depth.
pub fn cascade_property_paths(
    metadata: &MetadataRegistry,
    entity: &EntityDescriptor,
    max_depth: usize,
) -> Result<Arc<Vec<String>>> {
    if let Some(paths) = metadata.cached_cascade_paths(entity.name(), max_depth) {
        return Ok(paths);
    }

    let mut paths = Vec::new();
    collect_paths(metadata, entity, None, max_depth, 0, &mut paths)?;
    let paths = prune_prefixes(paths);

    debug!(
        "resolved {} cascade path(s) for '{}' (max depth {}): {:?}",
        paths.len(),
        entity.name(),
        max_depth,
        paths
    );
    metadata.store_cascade_paths(entity.name(), max_depth, paths)
}

fn collect_paths(
    metadata: &MetadataRegistry,
    entity: &EntityDescriptor,
    parent_path: Option<&str>,
    max_depth: usize,
    current_depth: usize,
    paths: &mut Vec<String>,
) -> Result<()> {
    if current_depth > max_depth {
        return Ok(());
    }

    for navigation in entity.navigations().filter(|p| p.is_cascade()) {
        let path = match parent_path {
            Some(parent) => format!("{}.{}", parent, navigation.name()),
            None => navigation.name().to_string(),
        };
        paths.push(path.clone());

        if navigation.is_collection() {
            let target = metadata.navigation_target(navigation)?;
            collect_paths(metadata, &target, Some(&path), max_depth, current_depth + 1, paths)?;
        }
    }

    Ok(())
}

/// Drops duplicates and every path another path extends (`A.B` when `A.B.C`
/// is present). Order of first appearance is kept.
pub fn prune_prefixes(paths: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.contains(&path) {
            unique.push(path);
        }
    }

    unique
        .iter()
        .filter(|path| {
            !unique.iter().any(|other| {
                other.len() > path.len()
                    && other.starts_with(path.as_str())
                    && other[path.len()..].starts_with('.')
            })
        })
        .cloned()
        .collect()
}
