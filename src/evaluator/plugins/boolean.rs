use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Result, Value};
use crate::expression::Expr;

/// Logical negation. NOT NULL stays NULL.
pub struct BooleanEvaluator;

impl ExpressionEvaluator for BooleanEvaluator {
    fn name(&self) -> &'static str {
        "BOOLEAN"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Not(_))
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::Not(inner) = expr else {
            unreachable!();
        };

        let value = context.evaluate(inner, scope)?;
        if value.is_null() {
            return Ok(Value::Null.into());
        }

        Ok(Value::Boolean(!value.as_bool()).into())
    }
}
