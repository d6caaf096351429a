use serde::{Deserialize, Deserializer};

use crate::core::{RepoError, Result, Value};
use crate::expression::{Expr, and_also, escape_like};
use crate::metadata::EntityDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// Case-insensitive substring match on text
    Contains,
    StartsWith,
    EndsWith,
    /// Value must be a list
    In,
    IsNull,
    IsNotNull,
}

/// A caller-supplied filter on one property, typically parsed from a
/// request body: `{ "property": "Total", "operator": "gt", "value": 10 }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterCondition {
    pub property: String,
    pub operator: FilterOperator,
    #[serde(default = "null_value", deserialize_with = "value_from_json")]
    pub value: Value,
}

fn null_value() -> Value {
    Value::Null
}

fn value_from_json<'de, D>(deserializer: D) -> std::result::Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Value::from_json)
}

impl FilterCondition {
    pub fn new(
        property: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            value: value.into(),
        }
    }

    /// Builds the predicate for this condition.
    ///
    /// The property is structurally required: a missing or navigation
    /// property is a developer error.
    pub fn to_expr(&self, entity: &EntityDescriptor) -> Result<Expr> {
        let property = entity.require_property(&self.property)?;
        if property.is_navigation() {
            return Err(RepoError::Developer(format!(
                "Cannot filter on navigation property '{}.{}'",
                entity.name(),
                self.property
            )));
        }

        let target = Expr::prop(self.property.clone());
        let value = self.value.clone();

        let expr = match self.operator {
            FilterOperator::Eq => target.eq(value),
            FilterOperator::NotEq => target.not_eq(value),
            FilterOperator::Lt => target.lt(value),
            FilterOperator::LtEq => target.lt_eq(value),
            FilterOperator::Gt => target.gt(value),
            FilterOperator::GtEq => target.gt_eq(value),
            FilterOperator::Contains => text_match(target, &value, |t| format!("%{}%", t))?,
            FilterOperator::StartsWith => text_match(target, &value, |t| format!("{}%", t))?,
            FilterOperator::EndsWith => text_match(target, &value, |t| format!("%{}", t))?,
            FilterOperator::In => match value {
                Value::List(items) => target.in_list(items),
                other => {
                    return Err(RepoError::TypeMismatch(format!(
                        "IN filter on '{}' requires a LIST, got {}",
                        self.property,
                        other.type_name()
                    )));
                }
            },
            FilterOperator::IsNull => target.is_null(),
            FilterOperator::IsNotNull => target.is_not_null(),
        };

        Ok(expr)
    }
}

fn text_match(target: Expr, value: &Value, pattern: impl Fn(&str) -> String) -> Result<Expr> {
    let Some(text) = value.as_str() else {
        return Err(RepoError::TypeMismatch(format!(
            "Text filter requires a TEXT value, got {}",
            value.type_name()
        )));
    };

    Ok(Expr::Like {
        expr: Box::new(target),
        pattern: pattern(&escape_like(text)),
        negated: false,
        case_insensitive: true,
    })
}

/// ANDs all conditions together; no conditions yields no predicate.
pub fn compile_conditions(
    entity: &EntityDescriptor,
    conditions: &[FilterCondition],
) -> Result<Option<Expr>> {
    let mut combined = None;
    for condition in conditions {
        combined = and_also(combined, Some(condition.to_expr(entity)?));
    }
    Ok(combined)
}
