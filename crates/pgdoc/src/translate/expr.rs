use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Binary operators of a predicate expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    AndAlso,
    OrElse,
    Add,
    Subtract,
    Multiply,
    Divide,
    Coalesce,
}

/// Method calls the translator knows about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Contains,
    StartsWith,
    EndsWith,
    /// Any other call; always rejected.
    Other(String),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Contains => f.write_str("Contains"),
            Method::StartsWith => f.write_str("StartsWith"),
            Method::EndsWith => f.write_str("EndsWith"),
            Method::Other(name) => f.write_str(name),
        }
    }
}

/// A value computed from captured state, evaluated once at translation time.
#[derive(Clone)]
pub struct Captured(Arc<dyn Fn() -> Value + Send + Sync>);

impl Captured {
    pub fn new<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Captured(Arc::new(move || f().into()))
    }

    pub fn evaluate(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Captured {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Captured(<closure>)")
    }
}

/// A predicate expression tree.
///
/// Built by hand or, more commonly, through the typed field handles generated by
/// `#[derive(Document)]`:
///
/// ```ignore
/// let expr = Person::FIRST_NAME.eq("Donald") & Person::AGE.gt(18);
/// ```
#[derive(Debug, Clone)]
pub enum Expr {
    /// Property access by JSON property name (dotted for nested properties).
    Member(String),
    /// Numeric/type conversion around another expression.
    Convert(Box<Expr>),
    Constant(Value),
    Captured(Captured),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        method: Method,
        target: Box<Expr>,
        argument: Box<Expr>,
    },
    Not(Box<Expr>),
}

impl Expr {
    pub fn member(key: impl Into<String>) -> Self {
        Expr::Member(key.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(value.into())
    }

    pub fn captured<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Expr::Captured(Captured::new(f))
    }

    pub fn convert(inner: Expr) -> Self {
        Expr::Convert(Box::new(inner))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(method: Method, target: Expr, argument: Expr) -> Self {
        Expr::Call {
            method,
            target: Box::new(target),
            argument: Box::new(argument),
        }
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::AndAlso, self, other)
    }

    /// Builds an `OrElse` node. The translator rejects it; use
    /// `push_or()`/`pop()` on the query for disjunctions.
    pub fn or(self, other: Expr) -> Self {
        Expr::binary(BinaryOp::OrElse, self, other)
    }

    /// Node kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Member(_) => "Member",
            Expr::Convert(_) => "Convert",
            Expr::Constant(_) => "Constant",
            Expr::Captured(_) => "Captured",
            Expr::Binary { .. } => "Binary",
            Expr::Call { .. } => "Call",
            Expr::Not(_) => "Not",
        }
    }

    /// Member access, optionally under conversions.
    pub(crate) fn is_member(&self) -> bool {
        match self {
            Expr::Member(_) => true,
            Expr::Convert(inner) => inner.is_member(),
            _ => false,
        }
    }
}

impl std::ops::BitAnd for Expr {
    type Output = Expr;

    fn bitand(self, rhs: Expr) -> Expr {
        self.and(rhs)
    }
}

impl std::ops::BitOr for Expr {
    type Output = Expr;

    fn bitor(self, rhs: Expr) -> Expr {
        self.or(rhs)
    }
}

impl std::ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}
