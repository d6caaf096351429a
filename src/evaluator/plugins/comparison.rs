use std::cmp::Ordering;

use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{RepoError, Result, Value};
use crate::expression::{BinaryOp, Expr};

/// Typed comparison operators plus dynamic `Equals`.
pub struct ComparisonEvaluator;

impl ExpressionEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Binary { op, .. } => op.is_comparison(),
            Expr::Equals { .. } => true,
            _ => false,
        }
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        match expr {
            Expr::Binary { left, op, right } => {
                let left_val = context.evaluate(left, scope)?;
                let right_val = context.evaluate(right, scope)?;

                let result = self.compare(&left_val, &right_val, op)?;
                Ok(Value::Boolean(result).into())
            }
            Expr::Equals { left, right } => {
                let left_val = context.evaluate(left, scope)?;
                let right_val = context.evaluate(right, scope)?;

                Ok(Value::Boolean(left_val == right_val).into())
            }
            _ => unreachable!(),
        }
    }
}

impl ComparisonEvaluator {
    pub fn compare(&self, left: &Value, right: &Value, op: &BinaryOp) -> Result<bool> {
        match (left, right) {
            // Equality against null follows reference semantics; ordering does not match
            (Value::Null, _) | (_, Value::Null) => Ok(match op {
                BinaryOp::Eq => left.is_null() && right.is_null(),
                BinaryOp::NotEq => !(left.is_null() && right.is_null()),
                _ => false,
            }),

            (Value::List(_), _)
            | (_, Value::List(_))
            | (Value::Object(_), _)
            | (_, Value::Object(_)) => {
                Err(RepoError::TypeMismatch(format!(
                    "Cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                )))
            }

            _ => {
                let ordering = left.compare(right)?;
                Ok(match op {
                    BinaryOp::Eq => left == right,
                    BinaryOp::NotEq => left != right,
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::LtEq => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::GtEq => ordering != Ordering::Less,
                    _ => unreachable!(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_comparisons() {
        let cmp = ComparisonEvaluator;
        assert!(cmp.compare(&Value::Null, &Value::Null, &BinaryOp::Eq).unwrap());
        assert!(!cmp.compare(&Value::Null, &Value::Integer(1), &BinaryOp::Eq).unwrap());
        assert!(cmp.compare(&Value::Null, &Value::Integer(1), &BinaryOp::NotEq).unwrap());
        assert!(!cmp.compare(&Value::Null, &Value::Integer(1), &BinaryOp::Lt).unwrap());
    }

    #[test]
    fn test_mixed_numeric_and_mismatch() {
        let cmp = ComparisonEvaluator;
        assert!(cmp.compare(&Value::Integer(2), &Value::Float(2.0), &BinaryOp::Eq).unwrap());
        assert!(cmp.compare(&Value::Integer(1), &Value::Float(1.5), &BinaryOp::Lt).unwrap());
        assert!(cmp.compare(&Value::Text("a".into()), &Value::Integer(1), &BinaryOp::Eq).is_err());
    }
}
