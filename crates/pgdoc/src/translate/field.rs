use super::expr::{BinaryOp, Expr, Method};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;

/// Typed handle to a property of document `D` holding values of type `V`.
///
/// Generated as associated constants by `#[derive(Document)]`
/// (`Person::FIRST_NAME: Field<Person, String>`); the value type restricts
/// which comparisons compile.
pub struct Field<D, V> {
    key: &'static str,
    _marker: PhantomData<fn() -> (D, V)>,
}

impl<D, V> Clone for Field<D, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, V> Copy for Field<D, V> {}

impl<D, V> fmt::Debug for Field<D, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Field").field(&self.key).finish()
    }
}

impl<D, V> AsRef<str> for Field<D, V> {
    fn as_ref(&self) -> &str {
        self.key
    }
}

impl<D, V> Field<D, V> {
    pub const fn new(key: &'static str) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    /// JSON property name.
    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn member(&self) -> Expr {
        Expr::member(self.key)
    }

    pub fn is_null(self) -> Expr {
        Expr::binary(BinaryOp::Equal, self.member(), Expr::Constant(Value::Null))
    }

    pub fn is_not_null(self) -> Expr {
        Expr::binary(BinaryOp::NotEqual, self.member(), Expr::Constant(Value::Null))
    }
}

impl<D, V: Into<Value>> Field<D, V> {
    fn compare(self, op: BinaryOp, value: V) -> Expr {
        Expr::binary(op, self.member(), Expr::constant(value))
    }

    pub fn eq(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::Equal, value.into())
    }

    pub fn ne(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::NotEqual, value.into())
    }

    pub fn lt(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::LessThan, value.into())
    }

    pub fn le(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::LessThanOrEqual, value.into())
    }

    pub fn gt(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::GreaterThan, value.into())
    }

    pub fn ge(self, value: impl Into<V>) -> Expr {
        self.compare(BinaryOp::GreaterThanOrEqual, value.into())
    }

    /// Compare against a value computed when the predicate is translated.
    pub fn eq_with<F>(self, f: F) -> Expr
    where
        F: Fn() -> V + Send + Sync + 'static,
    {
        Expr::binary(BinaryOp::Equal, self.member(), Expr::captured(f))
    }

    /// `values.Contains(field)`: an IN list. An empty list matches nothing.
    pub fn is_in<I, T>(self, values: I) -> Expr
    where
        I: IntoIterator<Item = T>,
        T: Into<V>,
    {
        let list = Value::list(values.into_iter().map(Into::<V>::into));
        Expr::call(Method::Contains, Expr::Constant(list), self.member())
    }

    /// Like [`Field::is_in`] with the collection captured by a closure.
    pub fn is_in_with<F>(self, f: F) -> Expr
    where
        F: Fn() -> Vec<V> + Send + Sync + 'static,
    {
        let values = Expr::captured(move || Value::list(f()));
        Expr::call(Method::Contains, values, self.member())
    }
}

impl<D> Field<D, bool> {
    /// The boolean property itself as a predicate.
    pub fn is_true(self) -> Expr {
        self.member()
    }

    pub fn is_false(self) -> Expr {
        !self.member()
    }
}

macro_rules! string_methods {
    ($ty:ty) => {
        impl<D> Field<D, $ty> {
            pub fn contains(self, text: impl Into<String>) -> Expr {
                Expr::call(Method::Contains, self.member(), Expr::constant(text.into()))
            }

            pub fn starts_with(self, text: impl Into<String>) -> Expr {
                Expr::call(Method::StartsWith, self.member(), Expr::constant(text.into()))
            }

            pub fn ends_with(self, text: impl Into<String>) -> Expr {
                Expr::call(Method::EndsWith, self.member(), Expr::constant(text.into()))
            }
        }
    };
}

string_methods!(String);
string_methods!(Option<String>);
