use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Entity, EntityDescriptor, PropertyDescriptor};
use crate::core::{RepoError, Result};

/// Registry of entity descriptors, immutable once built.
///
/// Cloning is cheap; adding an entity produces a new registry (copy-on-write).
/// Cascade include paths are memoized per entity and depth, since the metadata
/// they are derived from never changes after construction.
#[derive(Clone, Default)]
pub struct MetadataRegistry {
    entities: Arc<HashMap<String, Arc<EntityDescriptor>>>,
    cascade_paths: Arc<RwLock<HashMap<(String, usize), Arc<Vec<String>>>>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity<T: Entity>(self) -> Result<Self> {
        let descriptor = T::descriptor();
        if descriptor.name() != T::NAME {
            return Err(RepoError::Developer(format!(
                "Entity constant name '{}' does not match descriptor name '{}'",
                T::NAME,
                descriptor.name()
            )));
        }
        self.with_descriptor(descriptor)
    }

    pub fn with_descriptor(self, descriptor: EntityDescriptor) -> Result<Self> {
        let name = descriptor.name().to_string();
        if self.entities.contains_key(&name) {
            return Err(RepoError::Developer(format!(
                "Entity '{}' is already registered",
                name
            )));
        }
        if !descriptor.property_exists(descriptor.key()) {
            return Err(RepoError::property_not_found(&name, descriptor.key()));
        }

        let mut entities = (*self.entities).clone();
        entities.insert(name, Arc::new(descriptor));

        Ok(Self {
            entities: Arc::new(entities),
            cascade_paths: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn get(&self, name: &str) -> Result<Arc<EntityDescriptor>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| RepoError::EntityNotRegistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort();
        names
    }

    /// Target descriptor of a navigation property.
    pub fn navigation_target(
        &self,
        property: &PropertyDescriptor,
    ) -> Result<Arc<EntityDescriptor>> {
        match property.target() {
            Some(target) => self.get(target),
            None => Err(RepoError::Developer(format!(
                "Property '{}' is not a navigation",
                property.name()
            ))),
        }
    }

    /// Walks a dotted navigation path (`Lines.Product`) and returns the
    /// navigation properties it traverses, validating every segment.
    pub fn resolve_navigation_path(
        &self,
        root: &EntityDescriptor,
        path: &str,
    ) -> Result<Vec<(PropertyDescriptor, Arc<EntityDescriptor>)>> {
        let mut resolved = Vec::new();
        let mut current: Arc<EntityDescriptor> = self.get(root.name())?;

        for segment in path.split('.') {
            let property = current.require_property(segment)?.clone();
            if !property.is_navigation() {
                return Err(RepoError::Developer(format!(
                    "Property '{}' on entity '{}' is not a navigation and cannot be included",
                    segment,
                    current.name()
                )));
            }
            let target = self.navigation_target(&property)?;
            resolved.push((property, target.clone()));
            current = target;
        }

        Ok(resolved)
    }

    pub(crate) fn cached_cascade_paths(
        &self,
        entity: &str,
        max_depth: usize,
    ) -> Option<Arc<Vec<String>>> {
        self.cascade_paths
            .read()
            .ok()
            .and_then(|cache| cache.get(&(entity.to_string(), max_depth)).cloned())
    }

    pub(crate) fn store_cascade_paths(
        &self,
        entity: &str,
        max_depth: usize,
        paths: Vec<String>,
    ) -> Result<Arc<Vec<String>>> {
        let paths = Arc::new(paths);
        let mut cache = self.cascade_paths.write()?;
        cache.insert((entity.to_string(), max_depth), paths.clone());
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ScalarType;

    fn registry() -> MetadataRegistry {
        MetadataRegistry::new()
            .with_descriptor(
                EntityDescriptor::builder("Order")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("Note", ScalarType::Text))
                    .property(PropertyDescriptor::collection("Lines", "OrderLine", "OrderId"))
                    .build(),
            )
            .unwrap()
            .with_descriptor(
                EntityDescriptor::builder("OrderLine")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("OrderId", ScalarType::Integer))
                    .property(PropertyDescriptor::reference("Order", "Order", "OrderId"))
                    .build(),
            )
            .unwrap()
    }

    #[test]
    fn test_entity_names_are_sorted() {
        let registry = registry();
        assert_eq!(registry.entity_names(), vec!["Order", "OrderLine"]);
        assert!(registry.contains("OrderLine"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = registry();
        let again = registry.with_descriptor(
            EntityDescriptor::builder("Order")
                .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                .build(),
        );
        assert!(again.is_err());
    }

    #[test]
    fn test_missing_key_property_is_rejected() {
        let result = MetadataRegistry::new().with_descriptor(
            EntityDescriptor::builder("Keyless")
                .property(PropertyDescriptor::scalar("Name", ScalarType::Text))
                .build(),
        );
        assert!(matches!(result, Err(RepoError::PropertyNotFound { .. })));
    }

    #[test]
    fn test_resolve_navigation_path() {
        let registry = registry();
        let order = registry.get("Order").unwrap();

        let path = registry.resolve_navigation_path(&order, "Lines.Order").unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[1].1.name(), "Order");

        assert!(registry.resolve_navigation_path(&order, "Note").is_err());
        assert!(registry.resolve_navigation_path(&order, "Lines.Missing").is_err());
    }
}
