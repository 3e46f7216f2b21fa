//! Predicate translation.
//!
//! Two surfaces feed the same [`WhereNode`] model:
//!
//! - raw SQL fragments ([`parse_fragment`]), whose `@name` tokens are
//!   normalized but otherwise taken as-is;
//! - structured [`Expr`] trees, matched against a closed set of supported
//!   shapes. Anything outside that set is a [`DocError::Unsupported`].
//!
//! Fields are resolved through [`DocumentMap::field_ref`]: indexed properties
//! become columns, everything else a JSON path into the blob column.

mod expr;
mod field;
mod fragment;

#[cfg(test)]
mod tests;

pub use expr::{BinaryOp, Captured, Expr, Method};
pub use field::Field;
pub use fragment::parse_fragment;

use crate::ast::{CompareOp, FieldRef, LikeKind, WhereBuilder, WhereNode};
use crate::document::DocumentMap;
use crate::error::{DocError, DocResult};
use crate::param::ParamStore;
use crate::types::SqlType;
use crate::value::Value;

fn comparison_op(op: BinaryOp) -> Option<CompareOp> {
    Some(match op {
        BinaryOp::Equal => CompareOp::Eq,
        BinaryOp::NotEqual => CompareOp::Ne,
        BinaryOp::LessThan => CompareOp::Lt,
        BinaryOp::LessThanOrEqual => CompareOp::Le,
        BinaryOp::GreaterThan => CompareOp::Gt,
        BinaryOp::GreaterThanOrEqual => CompareOp::Ge,
        _ => return None,
    })
}

/// Translates [`Expr`] trees into where-clause nodes for one document map.
///
/// Values (constants and captured closures) are bound into the query's
/// parameter store under unique names as they are encountered.
pub struct Translator<'a> {
    map: &'a DocumentMap,
    store: &'a mut ParamStore,
    qualifier: Option<&'a str>,
}

impl<'a> Translator<'a> {
    pub fn new(map: &'a DocumentMap, store: &'a mut ParamStore, qualifier: Option<&'a str>) -> Self {
        Self {
            map,
            store,
            qualifier,
        }
    }

    /// Translate `expr` into `out`. `AndAlso` applies both sides in turn.
    pub fn translate(&mut self, expr: &Expr, out: &mut WhereBuilder) -> DocResult<()> {
        match expr {
            Expr::Binary {
                op: BinaryOp::AndAlso,
                left,
                right,
            } => {
                self.translate(left, out)?;
                self.translate(right, out)
            }
            other => {
                let node = self.node(other)?;
                out.add(node);
                Ok(())
            }
        }
    }

    /// Translate an expression that maps onto exactly one node.
    fn node(&mut self, expr: &Expr) -> DocResult<WhereNode> {
        match expr {
            Expr::Binary { op, left, right } => match comparison_op(*op) {
                Some(cmp) => self.comparison(cmp, left, right),
                None => Err(DocError::unsupported(format!("unsupported operand {op:?}"))),
            },
            Expr::Call {
                method,
                target,
                argument,
            } => self.call(method, target, argument, false),
            Expr::Not(inner) => self.negation(inner),
            member if member.is_member() => self.boolean(member, true),
            other => Err(DocError::unsupported(format!(
                "{} is not a predicate",
                other.kind()
            ))),
        }
    }

    fn negation(&mut self, inner: &Expr) -> DocResult<WhereNode> {
        match inner {
            Expr::Binary { op, left, right } => match comparison_op(*op) {
                Some(cmp) => match self.comparison(cmp, left, right)? {
                    WhereNode::Unary { field, op, param } => Ok(WhereNode::Unary {
                        field,
                        op: op.negated(),
                        param,
                    }),
                    WhereNode::IsNull { field, negated } => Ok(WhereNode::IsNull {
                        field,
                        negated: !negated,
                    }),
                    other => Ok(other),
                },
                None => Err(DocError::unsupported(format!(
                    "unsupported operand Not({op:?})"
                ))),
            },
            Expr::Call {
                method,
                target,
                argument,
            } => self.call(method, target, argument, true),
            Expr::Not(inner) => self.node(inner),
            member if member.is_member() => self.boolean(member, false),
            other => Err(DocError::unsupported(format!(
                "Not({}) is not a predicate",
                other.kind()
            ))),
        }
    }

    /// `field OP value`; a value on the left is mirrored to the right.
    fn comparison(&mut self, op: CompareOp, left: &Expr, right: &Expr) -> DocResult<WhereNode> {
        let (op, member, value) = if left.is_member() {
            (op, left, right)
        } else if right.is_member() {
            (op.mirrored(), right, left)
        } else {
            return Err(DocError::unsupported(format!(
                "{} is not supported as a member access",
                left.kind()
            )));
        };

        let key = member_key(member)?;
        let value = evaluate(value)?;

        if value.is_null() {
            let field = self.field(key, None)?;
            return match op {
                CompareOp::Eq => Ok(WhereNode::IsNull {
                    field,
                    negated: false,
                }),
                CompareOp::Ne => Ok(WhereNode::IsNull {
                    field,
                    negated: true,
                }),
                other => Err(DocError::unsupported(format!(
                    "{other:?} comparison with null"
                ))),
            };
        }

        let field = self.field(key, value.comparison_type())?;
        let param = self.store.bind_unique(&param_base(key), value);
        Ok(WhereNode::Unary { field, op, param })
    }

    fn call(
        &mut self,
        method: &Method,
        target: &Expr,
        argument: &Expr,
        negated: bool,
    ) -> DocResult<WhereNode> {
        let like = match method {
            Method::Contains => Some(LikeKind::Contains),
            Method::StartsWith => Some(LikeKind::StartsWith),
            Method::EndsWith => Some(LikeKind::EndsWith),
            Method::Other(_) => None,
        };

        match like {
            // text.Contains("x") / StartsWith / EndsWith
            Some(kind) if target.is_member() => {
                let key = member_key(target)?;
                let value = evaluate(argument)?;
                if !matches!(value, Value::Text(_)) {
                    return Err(DocError::unsupported(format!(
                        "{method} expects a text argument"
                    )));
                }
                let field = self.field(key, None)?;
                let param = self.store.bind_unique(&param_base(key), value);
                Ok(WhereNode::Unary {
                    field,
                    op: CompareOp::Like { kind, negated },
                    param,
                })
            }
            // values.Contains(field)
            Some(LikeKind::Contains) if argument.is_member() => {
                let key = member_key(argument)?;
                let values = match evaluate(target)? {
                    Value::List(items) => Value::List(items),
                    Value::Table(items) => Value::Table(items),
                    other => {
                        return Err(DocError::unsupported(format!(
                            "Contains expects a collection, got {other:?}"
                        )));
                    }
                };
                let field = self.field(key, values.comparison_type())?;
                let param = self.store.bind_unique(&param_base(key), values);
                Ok(WhereNode::Array {
                    field,
                    negated,
                    param,
                })
            }
            _ => Err(DocError::unsupported(format!(
                "method {method} on {} is not supported",
                target.kind()
            ))),
        }
    }

    /// A boolean member used directly as a predicate.
    fn boolean(&mut self, member: &Expr, expected: bool) -> DocResult<WhereNode> {
        let key = member_key(member)?;
        let field = self.field(key, Some(SqlType::Boolean))?;
        let param = self.store.bind_unique(&param_base(key), expected);
        Ok(WhereNode::Unary {
            field,
            op: CompareOp::Eq,
            param,
        })
    }

    fn field(&self, key: &str, cast: Option<SqlType>) -> DocResult<FieldRef> {
        Ok(self.map.field_ref(key, cast)?.qualified(self.qualifier))
    }
}

/// Property name of a member access, looking through conversions.
fn member_key(expr: &Expr) -> DocResult<&str> {
    match expr {
        Expr::Member(key) => Ok(key),
        Expr::Convert(inner) => member_key(inner),
        other => Err(DocError::unsupported(format!(
            "{} is not supported as a member access",
            other.kind()
        ))),
    }
}

/// Value of the non-member side of a comparison.
fn evaluate(expr: &Expr) -> DocResult<Value> {
    match expr {
        Expr::Constant(value) => Ok(value.clone()),
        Expr::Captured(captured) => Ok(captured.evaluate()),
        Expr::Convert(inner) => evaluate(inner),
        Expr::Member(key) => Err(DocError::unsupported(format!(
            "comparing member '{key}' against another member is not supported"
        ))),
        other => Err(DocError::unsupported(format!(
            "{} cannot be evaluated to a value",
            other.kind()
        ))),
    }
}

fn param_base(key: &str) -> String {
    key.replace('.', "_")
}
