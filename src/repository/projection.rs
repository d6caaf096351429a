use std::sync::Arc;

use log::trace;

use super::fetch_state::FetchSnapshot;
use crate::expression::visitor::walk_collection_op;
use crate::expression::{CollectionOp, Expr, ExprRewriter, walk_children};
use crate::metadata::{EntityDescriptor, MetadataRegistry, PropertyDescriptor, names};

/// Makes a projection soft-delete aware.
///
/// Every access to a collection navigation whose element entity is
/// soft-deletable gets a `.Where(x => x.IsDeleted == false)` before anything
/// else consumes it. The rewriter tracks the entity type of each lambda
/// parameter, so navigations reached inside `Select`/`Where`/`Any` bodies are
/// filtered too. Unresolvable members are left alone.
pub struct ProjectionRewriter<'m> {
    metadata: &'m MetadataRegistry,
    /// Entity type of the innermost lambda parameter; `None` when unknown
    scopes: Vec<Option<Arc<EntityDescriptor>>>,
    injected: usize,
}

impl<'m> ProjectionRewriter<'m> {
    pub fn new(metadata: &'m MetadataRegistry, root: Arc<EntityDescriptor>) -> Self {
        Self {
            metadata,
            scopes: vec![Some(root)],
            injected: 0,
        }
    }

    /// Number of filters injected so far.
    pub fn injected(&self) -> usize {
        self.injected
    }

    fn current_scope(&self) -> Option<Arc<EntityDescriptor>> {
        self.scopes.last().cloned().flatten()
    }

    /// Navigation at the end of a member path, with its target entity.
    fn resolve_navigation(
        &self,
        scope: Option<&Arc<EntityDescriptor>>,
        path: &str,
    ) -> Option<(PropertyDescriptor, Arc<EntityDescriptor>)> {
        let mut entity = scope?.clone();
        let mut segments = path.split('.').peekable();

        while let Some(segment) = segments.next() {
            let property = entity.property(segment)?;
            if !property.is_navigation() {
                return None;
            }
            let target = self.metadata.navigation_target(property).ok()?;
            if segments.peek().is_none() {
                return Some((property.clone(), target));
            }
            // Only references can be walked through
            if property.is_collection() {
                return None;
            }
            entity = target;
        }
        None
    }

    /// Entity type of the elements a collection-valued expression yields.
    fn element_type(
        &self,
        scope: Option<&Arc<EntityDescriptor>>,
        expr: &Expr,
    ) -> Option<Arc<EntityDescriptor>> {
        match expr {
            Expr::Property(path) => {
                let (property, target) = self.resolve_navigation(scope, path)?;
                property.is_collection().then_some(target)
            }
            Expr::Collection { source, op } => {
                let element = self.element_type(scope, source)?;
                match op {
                    op if op.preserves_elements() => Some(element),
                    CollectionOp::Select(body) => match body.as_ref() {
                        Expr::Property(path) => {
                            let (property, target) = self.resolve_navigation(Some(&element), path)?;
                            (!property.is_collection()).then_some(target)
                        }
                        _ => None,
                    },
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn filter_deleted(&mut self, source: Expr) -> Expr {
        self.injected += 1;
        source.filter(Expr::prop(names::IS_DELETED).eq(false))
    }
}

impl ExprRewriter for ProjectionRewriter<'_> {
    fn rewrite(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Property(path) => {
                let scope = self.current_scope();
                match self.resolve_navigation(scope.as_ref(), &path) {
                    Some((property, target))
                        if property.is_collection() && target.is_soft_deletable() =>
                    {
                        trace!("filtering soft-deleted elements of '{}' in projection", path);
                        self.filter_deleted(Expr::Property(path))
                    }
                    _ => Expr::Property(path),
                }
            }
            Expr::Collection { source, op } => {
                let source = self.rewrite(*source);
                let scope = self.current_scope();
                let element = self.element_type(scope.as_ref(), &source);

                self.scopes.push(element);
                let op = walk_collection_op(self, op);
                self.scopes.pop();

                Expr::Collection {
                    source: Box::new(source),
                    op,
                }
            }
            other => walk_children(self, other),
        }
    }
}

/// Rewrites `projection` when the snapshot excludes deleted rows; returns it
/// unchanged otherwise.
pub fn rewrite_projection(
    metadata: &MetadataRegistry,
    root: Arc<EntityDescriptor>,
    snapshot: FetchSnapshot,
    projection: Option<Expr>,
) -> Option<Expr> {
    let projection = projection?;
    if snapshot.include_deleted() {
        return Some(projection);
    }

    let mut rewriter = ProjectionRewriter::new(metadata, root);
    let rewritten = rewriter.rewrite(projection);
    trace!("projection rewritten with {} soft-delete filter(s)", rewriter.injected());
    Some(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ScalarType;

    fn metadata() -> MetadataRegistry {
        MetadataRegistry::new()
            .with_descriptor(
                EntityDescriptor::builder("Customer")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::collection("Orders", "Order", "CustomerId"))
                    .build(),
            )
            .unwrap()
            .with_descriptor(
                EntityDescriptor::builder("Order")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("CustomerId", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("IsDeleted", ScalarType::Boolean))
                    .property(PropertyDescriptor::reference("Customer", "Customer", "CustomerId"))
                    .property(PropertyDescriptor::collection("Lines", "OrderLine", "OrderId"))
                    .property(PropertyDescriptor::collection("Notes", "Note", "OrderId"))
                    .build(),
            )
            .unwrap()
            .with_descriptor(
                EntityDescriptor::builder("OrderLine")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("OrderId", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("IsDeleted", ScalarType::Boolean))
                    .build(),
            )
            .unwrap()
            .with_descriptor(
                EntityDescriptor::builder("Note")
                    .property(PropertyDescriptor::scalar("Id", ScalarType::Integer))
                    .property(PropertyDescriptor::scalar("OrderId", ScalarType::Integer))
                    .build(),
            )
            .unwrap()
    }

    fn live() -> Expr {
        Expr::prop("IsDeleted").eq(false)
    }

    fn rewrite(root: &str, snapshot: FetchSnapshot, projection: Expr) -> Expr {
        let metadata = metadata();
        let root = metadata.get(root).unwrap();
        rewrite_projection(&metadata, root, snapshot, Some(projection)).unwrap()
    }

    #[test]
    fn test_collection_members_are_filtered() {
        let projection = Expr::object([
            ("Id", Expr::prop("Id")),
            ("Lines", Expr::prop("Lines").to_list()),
            ("Notes", Expr::prop("Notes").to_list()),
        ]);

        let expected = Expr::object([
            ("Id", Expr::prop("Id")),
            ("Lines", Expr::prop("Lines").filter(live()).to_list()),
            ("Notes", Expr::prop("Notes").to_list()),
        ]);
        assert_eq!(rewrite("Order", FetchSnapshot::excluding_deleted(), projection), expected);
    }

    #[test]
    fn test_nested_lambda_bodies_use_element_scope() {
        let projection = Expr::prop("Orders").select(Expr::object([
            ("Id", Expr::prop("Id")),
            ("LineCount", Expr::prop("Lines").count()),
        ]));

        let expected = Expr::prop("Orders").filter(live()).select(Expr::object([
            ("Id", Expr::prop("Id")),
            ("LineCount", Expr::prop("Lines").filter(live()).count()),
        ]));
        assert_eq!(rewrite("Customer", FetchSnapshot::excluding_deleted(), projection), expected);
    }

    #[test]
    fn test_reference_paths_are_walked() {
        let projection = Expr::prop("Customer.Orders").count();
        let expected = Expr::prop("Customer.Orders").filter(live()).count();
        assert_eq!(rewrite("Order", FetchSnapshot::excluding_deleted(), projection), expected);
    }

    #[test]
    fn test_including_deleted_is_identity() {
        let projection = Expr::object([("Lines", Expr::prop("Lines").to_list())]);
        assert_eq!(
            rewrite("Order", FetchSnapshot::including_deleted(), projection.clone()),
            projection
        );
    }

    #[test]
    fn test_unmatched_projection_is_identity() {
        let projection = Expr::object([
            ("Total", Expr::prop("Id").multiply(2)),
            ("Missing", Expr::prop("NotAProperty")),
            (
                "Anonymous",
                Expr::prop("Lines")
                    .select(Expr::object([("X", Expr::prop("Y"))]))
                    .select(Expr::prop("X")),
            ),
        ]);
        let rewritten = rewrite("Note", FetchSnapshot::excluding_deleted(), projection.clone());
        assert_eq!(rewritten, projection);
    }

    #[test]
    fn test_absent_projection_stays_absent() {
        let metadata = metadata();
        let root = metadata.get("Order").unwrap();
        assert!(
            rewrite_projection(&metadata, root, FetchSnapshot::excluding_deleted(), None).is_none()
        );
    }
}
