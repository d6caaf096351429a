use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Result, Value};
use crate::expression::Expr;
use crate::expression::pattern::eval_like;

pub struct LikeEvaluator;

impl ExpressionEvaluator for LikeEvaluator {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Like { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
        } = expr
        else {
            unreachable!();
        };

        let result = match context.evaluate(expr, scope)? {
            Value::Text(text) => eval_like(&text, pattern, !case_insensitive)?,
            Value::Null => return Ok(Value::Boolean(false).into()),
            other => eval_like(&other.to_string(), pattern, !case_insensitive)?,
        };

        Ok(Value::Boolean(if *negated { !result } else { result }).into())
    }
}
