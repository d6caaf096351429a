pub mod plugins;

use std::borrow::Cow;
use std::sync::Arc;

use crate::core::{Record, RepoError, Result, Value};
use crate::expression::Expr;
use crate::metadata::{EntityDescriptor, MetadataRegistry, PropertyDescriptor};

/// Loads related rows for navigation member access.
pub trait Navigator: Send + Sync {
    /// Returns `Value::List` of objects for collections, `Value::Object` or
    /// `Value::Null` for references.
    fn navigate(
        &self,
        owner: &EntityDescriptor,
        record: &Record,
        navigation: &PropertyDescriptor,
    ) -> Result<Value>;
}

/// Navigator for callers that never traverse relationships.
pub struct NoNavigation;

impl Navigator for NoNavigation {
    fn navigate(
        &self,
        owner: &EntityDescriptor,
        _record: &Record,
        navigation: &PropertyDescriptor,
    ) -> Result<Value> {
        Err(RepoError::UnsupportedOperation(format!(
            "Navigation '{}.{}' cannot be loaded here",
            owner.name(),
            navigation.name()
        )))
    }
}

/// The lambda parameter an expression is evaluated against.
#[derive(Clone)]
pub struct Scope<'r> {
    pub record: &'r Record,
    /// Entity type of the record; `None` for anonymous projected shapes.
    pub entity: Option<Arc<EntityDescriptor>>,
}

impl<'r> Scope<'r> {
    pub fn entity(record: &'r Record, entity: Arc<EntityDescriptor>) -> Self {
        Self {
            record,
            entity: Some(entity),
        }
    }

    pub fn anonymous(record: &'r Record) -> Self {
        Self {
            record,
            entity: None,
        }
    }
}

/// An evaluation result that remembers which entity type its elements have.
#[derive(Debug, Clone)]
pub struct Evaluated {
    pub value: Value,
    pub entity: Option<Arc<EntityDescriptor>>,
}

impl Evaluated {
    pub fn typed(value: Value, entity: Option<Arc<EntityDescriptor>>) -> Self {
        Self { value, entity }
    }
}

impl From<Value> for Evaluated {
    fn from(value: Value) -> Self {
        Self {
            value,
            entity: None,
        }
    }
}

pub trait ExpressionEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_evaluate(&self, expr: &Expr) -> bool;

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated>;
}

pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
    metadata: &'a MetadataRegistry,
    navigator: &'a dyn Navigator,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(
        registry: &'a EvaluatorRegistry,
        metadata: &'a MetadataRegistry,
        navigator: &'a dyn Navigator,
    ) -> Self {
        Self {
            registry,
            metadata,
            navigator,
        }
    }

    pub fn metadata(&self) -> &MetadataRegistry {
        self.metadata
    }

    pub fn evaluate(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Value> {
        Ok(self.evaluate_typed(expr, scope)?.value)
    }

    /// Evaluates a predicate; NULL counts as false.
    pub fn matches(&self, predicate: Option<&Expr>, scope: &Scope<'_>) -> Result<bool> {
        match predicate {
            None => Ok(true),
            Some(expr) => Ok(self.evaluate(expr, scope)?.as_bool()),
        }
    }

    pub fn evaluate_typed(&self, expr: &Expr, scope: &Scope<'_>) -> Result<Evaluated> {
        // Base cases are resolved directly
        match expr {
            Expr::Literal(value) => return Ok(value.clone().into()),
            Expr::Property(path) => return self.resolve_property(path, scope),
            _ => {}
        }

        if let Some(evaluator) = self.registry.find_evaluator(expr) {
            return evaluator.evaluate(expr, scope, self);
        }

        Err(RepoError::UnsupportedOperation(format!(
            "No evaluator found for expression: {}",
            expr
        )))
    }

    fn resolve_property(&self, path: &str, scope: &Scope<'_>) -> Result<Evaluated> {
        let segments: Vec<&str> = path.split('.').collect();
        let mut record: Cow<'_, Record> = Cow::Borrowed(scope.record);
        let mut entity = scope.entity.clone();

        for (idx, segment) in segments.iter().enumerate() {
            let last = idx + 1 == segments.len();

            let (value, next_entity) = match entity.as_deref() {
                Some(descriptor) => {
                    let property = descriptor.require_property(segment)?;
                    if property.is_navigation() {
                        let target = self.metadata.navigation_target(property)?;
                        let related = self.navigator.navigate(descriptor, &record, property)?;
                        (related, Some(target))
                    } else {
                        (record.get(*segment).cloned().unwrap_or(Value::Null), None)
                    }
                }
                None => (record.get(*segment).cloned().unwrap_or(Value::Null), None),
            };

            if last {
                return Ok(Evaluated::typed(value, next_entity));
            }

            match value {
                Value::Object(inner) => {
                    record = Cow::Owned(inner);
                    entity = next_entity;
                }
                Value::Null => return Ok(Value::Null.into()),
                other => {
                    return Err(RepoError::TypeMismatch(format!(
                        "Cannot access '{}' on a {} value in path '{}'",
                        segments[idx + 1],
                        other.type_name(),
                        path
                    )));
                }
            }
        }

        Ok(Value::Null.into())
    }
}

pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        log::trace!("registered evaluator: {}", evaluator.name());
        self.evaluators.push(evaluator);
    }

    pub fn with_default_evaluators() -> Self {
        use plugins::*;

        let mut registry = Self::new();

        registry.register(Box::new(boolean::BooleanEvaluator));
        registry.register(Box::new(comparison::ComparisonEvaluator));
        registry.register(Box::new(arithmetic::ArithmeticEvaluator));
        registry.register(Box::new(logical::LogicalEvaluator));
        registry.register(Box::new(like::LikeEvaluator));
        registry.register(Box::new(is_null::IsNullEvaluator));
        registry.register(Box::new(in_list::InListEvaluator));
        registry.register(Box::new(collection::CollectionEvaluator));
        registry.register(Box::new(object::ObjectEvaluator));

        registry
    }

    fn find_evaluator(&self, expr: &Expr) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}
