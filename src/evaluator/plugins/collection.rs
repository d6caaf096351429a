use std::sync::Arc;

use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Record, RepoError, Result, Value};
use crate::expression::{CollectionOp, Expr};
use crate::metadata::EntityDescriptor;

/// Sequence operators over navigation collections and projected lists.
///
/// Lambda bodies are evaluated with each element as the scope. Elements that
/// came from a navigation keep their entity type, so nested navigation
/// access and property validation still work inside the lambda.
pub struct CollectionEvaluator;

impl ExpressionEvaluator for CollectionEvaluator {
    fn name(&self) -> &'static str {
        "COLLECTION"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Collection { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::Collection { source, op } = expr else {
            unreachable!();
        };

        let source = context.evaluate_typed(source, scope)?;
        let element_type = source.entity.clone();
        let items = into_items(source.value, op)?;

        match op {
            CollectionOp::Where(predicate) => {
                let mut kept = Vec::with_capacity(items.len());
                for item in items {
                    if element_matches(&item, &element_type, predicate, context)? {
                        kept.push(item);
                    }
                }
                Ok(Evaluated::typed(Value::List(kept), element_type))
            }

            CollectionOp::Select(projection) => {
                let mut projected = Vec::with_capacity(items.len());
                let mut projected_type = None;
                for item in &items {
                    let record = as_record(item)?;
                    let result =
                        context.evaluate_typed(projection, &element_scope(record, &element_type))?;
                    if projected_type.is_none() {
                        projected_type = result.entity;
                    }
                    projected.push(result.value);
                }
                Ok(Evaluated::typed(Value::List(projected), projected_type))
            }

            CollectionOp::Any(predicate) => {
                let Some(predicate) = predicate else {
                    return Ok(Value::Boolean(!items.is_empty()).into());
                };
                for item in &items {
                    if element_matches(item, &element_type, predicate, context)? {
                        return Ok(Value::Boolean(true).into());
                    }
                }
                Ok(Value::Boolean(false).into())
            }

            CollectionOp::Count(predicate) => {
                let count = match predicate {
                    None => items.len(),
                    Some(predicate) => {
                        let mut count = 0;
                        for item in &items {
                            if element_matches(item, &element_type, predicate, context)? {
                                count += 1;
                            }
                        }
                        count
                    }
                };
                Ok(Value::Integer(count as i64).into())
            }

            CollectionOp::ToList => Ok(Evaluated::typed(Value::List(items), element_type)),
        }
    }
}

fn into_items(value: Value, op: &CollectionOp) -> Result<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items),
        // An unloaded or absent collection behaves as empty
        Value::Null => Ok(Vec::new()),
        other => Err(RepoError::TypeMismatch(format!(
            "Collection operator {:?} requires a LIST, got {}",
            op,
            other.type_name()
        ))),
    }
}

fn as_record(item: &Value) -> Result<&Record> {
    item.as_object().ok_or_else(|| {
        RepoError::TypeMismatch(format!(
            "Collection lambda requires OBJECT elements, got {}",
            item.type_name()
        ))
    })
}

fn element_scope<'r>(
    record: &'r Record,
    element_type: &Option<Arc<EntityDescriptor>>,
) -> Scope<'r> {
    match element_type {
        Some(descriptor) => Scope::entity(record, descriptor.clone()),
        None => Scope::anonymous(record),
    }
}

fn element_matches(
    item: &Value,
    element_type: &Option<Arc<EntityDescriptor>>,
    predicate: &Expr,
    context: &EvaluationContext<'_>,
) -> Result<bool> {
    let record = as_record(item)?;
    context.matches(Some(predicate), &element_scope(record, element_type))
}
