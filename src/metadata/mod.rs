// ============================================================================
// Entity Metadata
// ============================================================================
//
// Descriptors replace runtime reflection: every entity publishes its property
// list once (usually through `#[derive(Entity)]`) and the capability flags the
// repository needs are computed when the descriptor is built.
//
// ============================================================================

pub mod registry;

pub use registry::MetadataRegistry;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::core::{Record, RepoError, Result, Value};

/// Well-known auditing and soft-delete property names.
///
/// A property from this vocabulary is used if and only if the entity
/// declares it.
pub mod names {
    pub const ID: &str = "Id";
    pub const IS_DELETED: &str = "IsDeleted";
    pub const CREATION_DATE: &str = "CreationDate";
    pub const CREATOR_USER_NAME: &str = "CreatorUserName";
    pub const LAST_MODIFICATION_DATE: &str = "LastModificationDate";
    pub const LAST_MODIFIER_USER_NAME: &str = "LastModifierUserName";
    pub const DELETION_DATE: &str = "DeletionDate";
    pub const DELETER_USER_NAME: &str = "DeleterUserName";
    pub const TRANSACTION_ID: &str = "TransactionId";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Integer,
    Float,
    Decimal,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    /// Opaque structured value stored as-is (maps, embedded lists, ...).
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar(ScalarType),
    /// Single related entity; `foreign_key` lives on the declaring entity.
    Reference { target: String, foreign_key: String },
    /// Related entities; `foreign_key` lives on the target entity.
    Collection { target: String, foreign_key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    kind: PropertyKind,
    nullable: bool,
    cascade: bool,
}

impl PropertyDescriptor {
    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Scalar(scalar),
            nullable: false,
            cascade: false,
        }
    }

    pub fn reference(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Reference {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
            nullable: true,
            cascade: false,
        }
    }

    pub fn collection(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Collection {
                target: target.into(),
                foreign_key: foreign_key.into(),
            },
            nullable: false,
            cascade: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Marks the navigation for inclusion when an entity is loaded for deletion.
    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_cascade(&self) -> bool {
        self.cascade
    }

    pub fn is_navigation(&self) -> bool {
        !matches!(self.kind, PropertyKind::Scalar(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, PropertyKind::Collection { .. })
    }

    /// Entity name on the other side of a navigation.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Reference { target, .. } | PropertyKind::Collection { target, .. } => {
                Some(target)
            }
            PropertyKind::Scalar(_) => None,
        }
    }

    pub fn foreign_key(&self) -> Option<&str> {
        match &self.kind {
            PropertyKind::Reference { foreign_key, .. }
            | PropertyKind::Collection { foreign_key, .. } => Some(foreign_key),
            PropertyKind::Scalar(_) => None,
        }
    }
}

/// Opt-in behaviors, derived from property presence when the descriptor is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub soft_delete: bool,
    pub creation_date: bool,
    pub creator_user_name: bool,
    pub modification_date: bool,
    pub modifier_user_name: bool,
    pub deletion_date: bool,
    pub deleter_user_name: bool,
    pub transaction_id: bool,
}

impl Capabilities {
    fn detect(properties: &[PropertyDescriptor]) -> Self {
        let has = |name: &str| {
            properties
                .iter()
                .any(|p| p.name == name && !p.is_navigation())
        };

        Self {
            soft_delete: has(names::IS_DELETED),
            creation_date: has(names::CREATION_DATE),
            creator_user_name: has(names::CREATOR_USER_NAME),
            modification_date: has(names::LAST_MODIFICATION_DATE),
            modifier_user_name: has(names::LAST_MODIFIER_USER_NAME),
            deletion_date: has(names::DELETION_DATE),
            deleter_user_name: has(names::DELETER_USER_NAME),
            transaction_id: has(names::TRANSACTION_ID),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: String,
    key: String,
    properties: Vec<PropertyDescriptor>,
    capabilities: Capabilities,
}

impl EntityDescriptor {
    pub fn builder(name: impl Into<String>) -> EntityDescriptorBuilder {
        EntityDescriptorBuilder {
            name: name.into(),
            key: names::ID.to_string(),
            properties: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the unique identifier property.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_soft_deletable(&self) -> bool {
        self.capabilities.soft_delete
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_exists(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Like [`property`](Self::property), for calls that cannot proceed without it.
    pub fn require_property(&self, name: &str) -> Result<&PropertyDescriptor> {
        self.property(name)
            .ok_or_else(|| RepoError::property_not_found(&self.name, name))
    }

    pub fn navigations(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_navigation())
    }

    pub fn scalar_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| !p.is_navigation())
    }

    /// Key value of a materialized record.
    pub fn key_of(&self, record: &Record) -> Result<Value> {
        match record.get(&self.key) {
            Some(Value::Null) | None => Err(RepoError::Developer(format!(
                "Entity '{}' has no value for key property '{}'",
                self.name, self.key
            ))),
            Some(value) => Ok(value.clone()),
        }
    }
}

pub struct EntityDescriptorBuilder {
    name: String,
    key: String,
    properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptorBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn build(self) -> EntityDescriptor {
        let capabilities = Capabilities::detect(&self.properties);
        EntityDescriptor {
            name: self.name,
            key: self.key,
            properties: self.properties,
            capabilities,
        }
    }
}

/// A persistable type with a compile-time metadata table.
///
/// Usually implemented with `#[derive(Entity)]`; property names must match the
/// serialized field names.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const NAME: &'static str;

    fn descriptor() -> EntityDescriptor;
}

pub fn to_record<T: Serialize>(entity: &T) -> Result<Record> {
    match Value::from_json(serde_json::to_value(entity)?) {
        Value::Object(record) => Ok(record),
        other => Err(RepoError::TypeMismatch(format!(
            "Entity serialized to {} instead of an object",
            other.type_name()
        ))),
    }
}

pub fn from_record<T: DeserializeOwned>(record: Record) -> Result<T> {
    from_value(Value::Object(record))
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value.to_json())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_descriptor() -> EntityDescriptor {
        EntityDescriptor::builder("Order")
            .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
            .property(PropertyDescriptor::scalar("IsDeleted", ScalarType::Boolean))
            .property(PropertyDescriptor::scalar("DeletionDate", ScalarType::Timestamp).nullable())
            .property(PropertyDescriptor::collection("Lines", "OrderLine", "OrderId").cascade())
            .build()
    }

    #[test]
    fn test_capabilities_follow_property_presence() {
        let caps = order_descriptor().capabilities();
        assert!(caps.soft_delete);
        assert!(caps.deletion_date);
        assert!(!caps.deleter_user_name);
        assert!(!caps.modification_date);
    }

    #[test]
    fn test_require_property_reports_developer_error() {
        let descriptor = order_descriptor();
        let err = descriptor.require_property("Missing").unwrap_err();
        assert!(err.is_developer_error());
        assert!(descriptor.require_property("Lines").unwrap().is_cascade());
    }

    #[test]
    fn test_key_of_rejects_missing_key() {
        let descriptor = order_descriptor();
        let mut record = Record::new();
        assert!(descriptor.key_of(&record).is_err());
        record.insert("Id".into(), Value::Integer(3));
        assert_eq!(descriptor.key_of(&record).unwrap(), Value::Integer(3));
    }
}
