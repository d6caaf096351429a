use log::debug;

use crate::config::RepositoryOptions;
use crate::context::Assignment;
use crate::core::Value;
use crate::expression::Expr;
use crate::metadata::{EntityDescriptor, names};

/// Property assignments of a set-based update.
///
/// Values are either literals or expressions evaluated against each row.
/// Assigning the same property twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetPropertyBuilder {
    assignments: Vec<Assignment>,
    audit_calls_added: bool,
}

impl SetPropertyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_expr(property, Expr::Literal(value.into()))
    }

    /// Assigns an expression evaluated per row, e.g. `Expr::prop("Version").add(1)`.
    pub fn set_expr(mut self, property: impl Into<String>, value: Expr) -> Self {
        let property = property.into();
        self.assignments.retain(|a| a.property != property);
        self.assignments.push(Assignment::new(property, value));
        self
    }

    /// Declares the audit columns handled, so no modification stamps are appended.
    pub fn mark_audit_calls_added(mut self) -> Self {
        self.audit_calls_added = true;
        self
    }

    pub fn audit_calls_added(&self) -> bool {
        self.audit_calls_added
    }

    pub fn contains(&self, property: &str) -> bool {
        self.assignments.iter().any(|a| a.property == property)
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn into_assignments(self) -> Vec<Assignment> {
        self.assignments
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Sets `property` unless the caller already did.
    fn set_default(&mut self, property: &str, value: Value) {
        if !self.contains(property) {
            self.assignments.push(Assignment::new(property, value));
        }
    }

    /// Appends `LastModificationDate`/`LastModifierUserName` for the columns
    /// the entity declares and the options enable.
    pub(crate) fn append_modification_audit(
        &mut self,
        entity: &EntityDescriptor,
        options: &RepositoryOptions,
        now: &Value,
        user: Option<&str>,
    ) {
        let capabilities = entity.capabilities();

        if capabilities.modification_date && options.audit_modification_date {
            self.set_default(names::LAST_MODIFICATION_DATE, now.clone());
        }
        if capabilities.modifier_user_name && options.audit_modifier {
            match user {
                Some(user) => self.set_default(names::LAST_MODIFIER_USER_NAME, Value::from(user)),
                None => debug!(
                    "no current user; '{}' not stamped on '{}'",
                    names::LAST_MODIFIER_USER_NAME,
                    entity.name()
                ),
            }
        }
        self.audit_calls_added = true;
    }

    /// Turns the builder into a soft delete: `IsDeleted = true` plus the
    /// enabled deletion audit columns.
    pub(crate) fn append_soft_delete(
        &mut self,
        entity: &EntityDescriptor,
        options: &RepositoryOptions,
        now: &Value,
        user: Option<&str>,
    ) {
        let capabilities = entity.capabilities();

        self.set_default(names::IS_DELETED, Value::Boolean(true));
        if capabilities.deletion_date && options.audit_deletion_date {
            self.set_default(names::DELETION_DATE, now.clone());
        }
        if capabilities.deleter_user_name && options.audit_deleter {
            match user {
                Some(user) => self.set_default(names::DELETER_USER_NAME, Value::from(user)),
                None => debug!(
                    "no current user; '{}' not stamped on '{}'",
                    names::DELETER_USER_NAME,
                    entity.name()
                ),
            }
        }
        self.audit_calls_added = true;
    }
}
