use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Result, Value};
use crate::expression::{BinaryOp, Expr};

pub struct LogicalEvaluator;

impl ExpressionEvaluator for LogicalEvaluator {
    fn name(&self) -> &'static str {
        "LOGICAL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        if let Expr::Binary { op, .. } = expr {
            op.is_logical()
        } else {
            false
        }
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::Binary { left, op, right } = expr else {
            unreachable!();
        };

        match op {
            BinaryOp::And => {
                let left_val = context.evaluate(left, scope)?;
                if !left_val.as_bool() {
                    return Ok(Value::Boolean(false).into());
                }
                let right_val = context.evaluate(right, scope)?;
                Ok(Value::Boolean(right_val.as_bool()).into())
            }

            BinaryOp::Or => {
                let left_val = context.evaluate(left, scope)?;
                if left_val.as_bool() {
                    return Ok(Value::Boolean(true).into());
                }
                let right_val = context.evaluate(right, scope)?;
                Ok(Value::Boolean(right_val.as_bool()).into())
            }

            _ => unreachable!(),
        }
    }
}
