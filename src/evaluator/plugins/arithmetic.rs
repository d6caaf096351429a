use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{RepoError, Result, Value};
use crate::expression::{BinaryOp, Expr};

pub struct ArithmeticEvaluator;

impl ExpressionEvaluator for ArithmeticEvaluator {
    fn name(&self) -> &'static str {
        "ARITHMETIC"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        if let Expr::Binary { op, .. } = expr {
            op.is_arithmetic()
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

        let left_val = context.evaluate(left, scope)?;
        let right_val = context.evaluate(right, scope)?;

        apply(*op, left_val, right_val).map(Evaluated::from)
    }
}

/// Applies an arithmetic operator. Exposed for set-property updates that
/// compute a new value from the current one.
pub fn apply(op: BinaryOp, left: Value, right: Value) -> Result<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),

        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Subtract => a.checked_sub(b),
                BinaryOp::Multiply => a.checked_mul(b),
                BinaryOp::Divide => {
                    if b == 0 {
                        return Err(RepoError::ExecutionError("Division by zero".into()));
                    }
                    a.checked_div(b)
                }
                BinaryOp::Modulo => {
                    if b == 0 {
                        return Err(RepoError::ExecutionError("Modulo by zero".into()));
                    }
                    a.checked_rem(b)
                }
                _ => unreachable!(),
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| RepoError::ExecutionError(format!("Integer overflow in {}", op)))
        }

        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, a, b))),

        // Mixed Integer/Float arithmetic - always returns Float
        (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(float_op(op, a as f64, b))),
        (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(float_op(op, a, b as f64))),

        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(a + &b)),

        (a, b) => Err(RepoError::TypeMismatch(format!(
            "Arithmetic requires numeric types, got {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Subtract => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply() {
        assert_eq!(
            apply(BinaryOp::Add, Value::Integer(2), Value::Integer(3)).unwrap(),
            Value::Integer(5)
        );
        assert_eq!(
            apply(BinaryOp::Multiply, Value::Integer(2), Value::Float(1.5)).unwrap(),
            Value::Float(3.0)
        );
        assert!(apply(BinaryOp::Divide, Value::Integer(1), Value::Integer(0)).is_err());
        assert!(apply(BinaryOp::Add, Value::Null, Value::Integer(1)).unwrap().is_null());
        assert!(apply(BinaryOp::Add, Value::Boolean(true), Value::Integer(1)).is_err());
    }
}
