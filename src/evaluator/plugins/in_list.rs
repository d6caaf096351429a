use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Result, Value};
use crate::expression::Expr;

pub struct InListEvaluator;

impl ExpressionEvaluator for InListEvaluator {
    fn name(&self) -> &'static str {
        "IN_LIST"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::InList { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::InList { expr, list, negated } = expr else {
            unreachable!();
        };

        let left = context.evaluate(expr, scope)?;
        if left.is_null() {
            return Ok(Value::Null.into());
        }

        let found = list.iter().any(|item| !item.is_null() && *item == left);
        Ok(Value::Boolean(found != *negated).into())
    }
}
