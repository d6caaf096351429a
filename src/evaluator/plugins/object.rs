use super::super::{EvaluationContext, Evaluated, ExpressionEvaluator, Scope};
use crate::core::{Record, Result, Value};
use crate::expression::Expr;

/// Member-init projections build an anonymous record.
pub struct ObjectEvaluator;

impl ExpressionEvaluator for ObjectEvaluator {
    fn name(&self) -> &'static str {
        "OBJECT"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Object(_))
    }

    fn evaluate(
        &self,
        expr: &Expr,
        scope: &Scope<'_>,
        context: &EvaluationContext<'_>,
    ) -> Result<Evaluated> {
        let Expr::Object(fields) = expr else {
            unreachable!();
        };

        let mut record = Record::new();
        for (name, field) in fields {
            record.insert(name.clone(), context.evaluate(field, scope)?);
        }

        Ok(Value::Object(record).into())
    }
}
