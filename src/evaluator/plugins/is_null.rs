use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Result, Value};
use crate::expression::Expr;

pub struct IsNullEvaluator;

impl ExpressionEvaluator for IsNullEvaluator {
    fn name(&self) -> &'static str {
        "IS_NULL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::IsNull { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::IsNull { expr, negated } = expr else {
            unreachable!();
        };

        let is_null = context.evaluate(expr, scope)?.is_null();
        let result = if *negated { !is_null } else { is_null };

        Ok(Value::Boolean(result).into())
    }
}
