use super::{CollectionOp, Expr};

/// Structural, bottom-up rewriting of expression trees.
///
/// Implementors override [`rewrite`](ExprRewriter::rewrite) for the nodes they
/// care about and delegate everything else to [`walk_children`], which
/// rebuilds a node after rewriting its children.
pub trait ExprRewriter {
    fn rewrite(&mut self, expr: Expr) -> Expr {
        walk_children(self, expr)
    }
}

pub fn walk_children<R: ExprRewriter + ?Sized>(rewriter: &mut R, expr: Expr) -> Expr {
    match expr {
        Expr::Literal(_) | Expr::Property(_) => expr,
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Box::new(rewriter.rewrite(*left)),
            op,
            right: Box::new(rewriter.rewrite(*right)),
        },
        Expr::Equals { left, right } => Expr::Equals {
            left: Box::new(rewriter.rewrite(*left)),
            right: Box::new(rewriter.rewrite(*right)),
        },
        Expr::Not(inner) => Expr::Not(Box::new(rewriter.rewrite(*inner))),
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(rewriter.rewrite(*expr)),
            negated,
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(rewriter.rewrite(*expr)),
            list,
            negated,
        },
        Expr::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
        } => Expr::Like {
            expr: Box::new(rewriter.rewrite(*expr)),
            pattern,
            negated,
            case_insensitive,
        },
        Expr::Collection { source, op } => Expr::Collection {
            source: Box::new(rewriter.rewrite(*source)),
            op: walk_collection_op(rewriter, op),
        },
        Expr::Object(fields) => Expr::Object(
            fields
                .into_iter()
                .map(|(name, value)| (name, rewriter.rewrite(value)))
                .collect(),
        ),
    }
}

pub fn walk_collection_op<R: ExprRewriter + ?Sized>(
    rewriter: &mut R,
    op: CollectionOp,
) -> CollectionOp {
    match op {
        CollectionOp::Where(body) => CollectionOp::Where(Box::new(rewriter.rewrite(*body))),
        CollectionOp::Select(body) => CollectionOp::Select(Box::new(rewriter.rewrite(*body))),
        CollectionOp::Any(body) => CollectionOp::Any(body.map(|b| Box::new(rewriter.rewrite(*b)))),
        CollectionOp::Count(body) => {
            CollectionOp::Count(body.map(|b| Box::new(rewriter.rewrite(*b))))
        }
        CollectionOp::ToList => CollectionOp::ToList,
    }
}
