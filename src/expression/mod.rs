// ============================================================================
// Expression Trees
// ============================================================================
//
// Predicates and projections are plain `Expr` values. They are built by the
// caller (or composed by the repository), rewritten structurally, and handed
// to the data context for evaluation. Nothing here performs I/O.
//
// Lambda scoping: a top-level expression is evaluated against the queried
// entity; the body of a collection operator is evaluated against each
// element of the collection.
//
// ============================================================================

pub mod pattern;
pub mod visitor;

pub use visitor::{ExprRewriter, walk_children};

use std::fmt;

use crate::core::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value
    Literal(Value),

    /// Member access on the current lambda parameter (`Total`, `Customer.Name`)
    Property(String),

    /// Binary operation (a + b, a = b, a AND b, ...)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// Dynamic equality: operands of unrelated types compare unequal instead
    /// of failing, so keys of any type can be matched.
    Equals { left: Box<Expr>, right: Box<Expr> },

    Not(Box<Expr>),

    IsNull { expr: Box<Expr>, negated: bool },

    InList {
        expr: Box<Expr>,
        list: Vec<Value>,
        negated: bool,
    },

    /// LIKE pattern matching (`%` and `_` wildcards, `\` escapes)
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
        case_insensitive: bool,
    },

    /// Operator applied to a collection, usually a navigation property
    Collection { source: Box<Expr>, op: CollectionOp },

    /// Member-init projection (`new { Id = o.Id, Lines = ... }`)
    Object(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulo
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOp {
    Where(Box<Expr>),
    Select(Box<Expr>),
    Any(Option<Box<Expr>>),
    Count(Option<Box<Expr>>),
    /// Materializes the sequence
    ToList,
}

impl CollectionOp {
    /// Whether the operator keeps the element type of its source.
    pub fn preserves_elements(&self) -> bool {
        matches!(self, Self::Where(_) | Self::ToList)
    }

    pub fn lambda(&self) -> Option<&Expr> {
        match self {
            Self::Where(body) | Self::Select(body) => Some(body),
            Self::Any(body) | Self::Count(body) => body.as_deref(),
            Self::ToList => None,
        }
    }
}

/// Combines two optional predicates with logical AND.
///
/// A missing operand is the identity: `and_also(None, Some(p)) == Some(p)`.
pub fn and_also(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.and(right)),
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

/// Escapes LIKE wildcards in user text.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Expr {
    pub fn prop(path: impl Into<String>) -> Self {
        Self::Property(path.into())
    }

    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn object<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Expr)>,
        K: Into<String>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(name, expr)| (name.into(), expr))
                .collect(),
        )
    }

    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Self::Binary {
            left: Box::new(self),
            op,
            right: Box::new(right.into()),
        }
    }

    pub fn eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn not_eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::NotEq, right)
    }

    pub fn lt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn lt_eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::LtEq, right)
    }

    pub fn gt(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn gt_eq(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::GtEq, right)
    }

    pub fn and(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, right)
    }

    pub fn add(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Add, right)
    }

    pub fn subtract(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Subtract, right)
    }

    pub fn multiply(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Multiply, right)
    }

    pub fn divide(self, right: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Divide, right)
    }

    pub fn equals(self, right: impl Into<Expr>) -> Self {
        Self::Equals {
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn is_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Self {
        Self::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn in_list<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::InList {
            expr: Box::new(self),
            list: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Self {
        Self::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
            case_insensitive: false,
        }
    }

    pub fn contains(self, text: &str) -> Self {
        self.like(format!("%{}%", escape_like(text)))
    }

    pub fn starts_with(self, text: &str) -> Self {
        self.like(format!("{}%", escape_like(text)))
    }

    pub fn ends_with(self, text: &str) -> Self {
        self.like(format!("%{}", escape_like(text)))
    }

    fn collection(self, op: CollectionOp) -> Self {
        Self::Collection {
            source: Box::new(self),
            op,
        }
    }

    /// `source.Where(predicate)`
    pub fn filter(self, predicate: Expr) -> Self {
        self.collection(CollectionOp::Where(Box::new(predicate)))
    }

    /// `source.Select(projection)`
    pub fn select(self, projection: Expr) -> Self {
        self.collection(CollectionOp::Select(Box::new(projection)))
    }

    pub fn any(self) -> Self {
        self.collection(CollectionOp::Any(None))
    }

    pub fn any_where(self, predicate: Expr) -> Self {
        self.collection(CollectionOp::Any(Some(Box::new(predicate))))
    }

    pub fn count(self) -> Self {
        self.collection(CollectionOp::Count(None))
    }

    pub fn count_where(self, predicate: Expr) -> Self {
        self.collection(CollectionOp::Count(Some(Box::new(predicate))))
    }

    pub fn to_list(self) -> Self {
        self.collection(CollectionOp::ToList)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Self::Literal(Value::Boolean(value))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Self::Literal(Value::Integer(value))
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Self::Literal(Value::Float(value))
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Self::Literal(Value::from(value))
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Self::Literal(Value::Text(value))
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::And => "&&",
            Self::Or => "||",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Property(path) => write!(f, "x.{}", path),
            Expr::Binary { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Equals { left, right } => write!(f, "{}.Equals({})", left, right),
            Expr::Not(expr) => write!(f, "!({})", expr),
            Expr::IsNull { expr, negated } => {
                write!(f, "({} {} null)", expr, if *negated { "!=" } else { "==" })
            }
            Expr::InList { expr, list, negated } => {
                let items: Vec<String> = list.iter().map(|v| v.to_string()).collect();
                write!(
                    f,
                    "{}[{}].Contains({})",
                    if *negated { "!" } else { "" },
                    items.join(", "),
                    expr
                )
            }
            Expr::Like {
                expr,
                pattern,
                negated,
                ..
            } => write!(
                f,
                "{} {}LIKE '{}'",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expr::Collection { source, op } => match op {
                CollectionOp::Where(body) => write!(f, "{}.Where(x => {})", source, body),
                CollectionOp::Select(body) => write!(f, "{}.Select(x => {})", source, body),
                CollectionOp::Any(Some(body)) => write!(f, "{}.Any(x => {})", source, body),
                CollectionOp::Any(None) => write!(f, "{}.Any()", source),
                CollectionOp::Count(Some(body)) => write!(f, "{}.Count(x => {})", source, body),
                CollectionOp::Count(None) => write!(f, "{}.Count()", source),
                CollectionOp::ToList => write!(f, "{}.ToList()", source),
            },
            Expr::Object(fields) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(name, expr)| format!("{} = {}", name, expr))
                    .collect();
                write!(f, "new {{ {} }}", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_also_is_null_safe() {
        let p = Expr::prop("Total").gt(10);
        assert_eq!(and_also(None, None), None);
        assert_eq!(and_also(Some(p.clone()), None), Some(p.clone()));
        assert_eq!(and_also(None, Some(p.clone())), Some(p.clone()));

        let both = and_also(Some(p.clone()), Some(Expr::prop("IsDeleted").eq(false))).unwrap();
        assert!(matches!(both, Expr::Binary { op: BinaryOp::And, .. }));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(
            Expr::prop("Name").contains("a%"),
            Expr::prop("Name").like("%a\\%%")
        );
    }

    #[test]
    fn test_display_reads_like_a_lambda() {
        let expr = Expr::prop("Lines")
            .filter(Expr::prop("IsDeleted").eq(false))
            .count();
        assert_eq!(expr.to_string(), "x.Lines.Where(x => (x.IsDeleted == false)).Count()");
    }

    #[test]
    fn test_arithmetic_and_counting_builders() {
        let net = Expr::prop("Total").subtract(Expr::prop("Discount")).divide(2);
        assert!(matches!(net, Expr::Binary { op: BinaryOp::Divide, .. }));
        assert_eq!(net.to_string(), "((x.Total - x.Discount) / 2)");

        let live = Expr::prop("Lines").count_where(Expr::prop("IsDeleted").eq(false));
        assert!(matches!(
            live,
            Expr::Collection { op: CollectionOp::Count(Some(_)), .. }
        ));
        assert_eq!(live.to_string(), "x.Lines.Count(x => (x.IsDeleted == false))");
    }
}
