//! Predicate tree and the push/pop group builder.

use super::{FieldRef, SelectAst};
use crate::error::{DocError, DocResult};
use std::collections::HashMap;

/// Comparison operator of a [`WhereNode::Unary`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like { kind: LikeKind, negated: bool },
}

impl CompareOp {
    /// Operator with its operands swapped (`5 < x` ⇔ `x > 5`).
    pub fn mirrored(self) -> Self {
        match self {
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            other => other,
        }
    }

    /// Logical negation (`NOT (x < 5)` ⇔ `x >= 5`).
    pub fn negated(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Le => CompareOp::Gt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Like { kind, negated } => CompareOp::Like {
                kind,
                negated: !negated,
            },
        }
    }
}

/// Where the wildcards go in a LIKE pattern built from a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LikeKind {
    /// `%value%`
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

/// AND / OR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn keyword(self) -> &'static str {
        match self {
            Logic::And => " AND ",
            Logic::Or => " OR ",
        }
    }
}

/// One piece of a raw SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentPart {
    Raw(String),
    /// Normalized parameter name.
    Param(String),
}

/// Raw SQL with its `@name` tokens already normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub parts: Vec<FragmentPart>,
}

impl Fragment {
    /// Parameter names referenced by this fragment, in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            FragmentPart::Param(name) => Some(name.as_str()),
            FragmentPart::Raw(_) => None,
        })
    }
}

/// A node of the predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereNode {
    /// `field OP @param`
    Unary {
        field: FieldRef,
        op: CompareOp,
        param: String,
    },
    /// `field [NOT] BETWEEN @start AND @end`
    Binary {
        field: FieldRef,
        negated: bool,
        start: String,
        end: String,
    },
    /// `field [NOT] IN (...)` over a list or table-valued parameter.
    Array {
        field: FieldRef,
        negated: bool,
        param: String,
    },
    /// Opaque raw SQL.
    Custom(Fragment),
    /// `field IS [NOT] NULL`
    IsNull { field: FieldRef, negated: bool },
    /// `field [NOT] IN (SELECT ...)`
    SubQuery {
        field: FieldRef,
        negated: bool,
        select: Box<SelectAst>,
    },
    /// Parenthesized conjunction/disjunction.
    Composite { logic: Logic, children: Vec<WhereNode> },
}

impl WhereNode {
    /// Rewrite parameter names (after a parameter store merge).
    pub fn rename_params(&mut self, renames: &HashMap<String, String>) {
        let rename = |name: &mut String| {
            if let Some(new) = renames.get(name.as_str()) {
                *name = new.clone();
            }
        };
        match self {
            WhereNode::Unary { param, .. } | WhereNode::Array { param, .. } => rename(param),
            WhereNode::Binary { start, end, .. } => {
                rename(start);
                rename(end);
            }
            WhereNode::Custom(fragment) => {
                for part in &mut fragment.parts {
                    if let FragmentPart::Param(name) = part {
                        rename(name);
                    }
                }
            }
            WhereNode::IsNull { .. } => {}
            WhereNode::SubQuery { select, .. } => select.rename_params(renames),
            WhereNode::Composite { children, .. } => {
                for child in children {
                    child.rename_params(renames);
                }
            }
        }
    }

    /// Qualify every unqualified field reference with `alias`.
    pub fn qualify(&mut self, alias: &str) {
        match self {
            WhereNode::Unary { field, .. }
            | WhereNode::Binary { field, .. }
            | WhereNode::Array { field, .. }
            | WhereNode::IsNull { field, .. }
            | WhereNode::SubQuery { field, .. } => field.qualify(alias),
            WhereNode::Custom(_) => {}
            WhereNode::Composite { children, .. } => {
                for child in children {
                    child.qualify(alias);
                }
            }
        }
    }
}

/// Builds a predicate tree through explicit group push/pop.
///
/// Conditions land in the innermost open group. Popping a group that received
/// no conditions discards it, so no `()` is ever rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereBuilder {
    stack: Vec<(Logic, Vec<WhereNode>)>,
}

impl Default for WhereBuilder {
    fn default() -> Self {
        Self {
            stack: vec![(Logic::And, Vec::new())],
        }
    }
}

impl WhereBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition to the innermost open group.
    pub fn add(&mut self, node: WhereNode) {
        if let Some((_, children)) = self.stack.last_mut() {
            children.push(node);
        }
    }

    /// Open a conjunction group.
    pub fn push_and(&mut self) {
        self.stack.push((Logic::And, Vec::new()));
    }

    /// Open a disjunction group.
    pub fn push_or(&mut self) {
        self.stack.push((Logic::Or, Vec::new()));
    }

    /// Close the innermost group.
    pub fn pop(&mut self) -> DocResult<()> {
        if self.stack.len() <= 1 {
            return Err(DocError::UnbalancedGroups(
                "pop() without a matching push_and()/push_or()".into(),
            ));
        }
        if let Some((logic, mut children)) = self.stack.pop() {
            if children.len() > 1 {
                self.add(WhereNode::Composite { logic, children });
            } else if let Some(only) = children.pop() {
                self.add(only);
            }
        }
        Ok(())
    }

    /// Qualify every condition added so far with `alias`.
    pub fn qualify(&mut self, alias: &str) {
        for (_, children) in &mut self.stack {
            for child in children {
                child.qualify(alias);
            }
        }
    }

    /// Number of groups still open.
    pub fn open_groups(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.stack.iter().all(|(_, children)| children.is_empty())
    }

    /// Produce the final predicate; fails if any group is still open.
    pub fn build(&self) -> DocResult<Option<WhereNode>> {
        let open = self.open_groups();
        if open > 0 {
            return Err(DocError::UnbalancedGroups(format!(
                "{open} group(s) pushed but never popped"
            )));
        }
        let root = &self.stack[0].1;
        Ok(match root.len() {
            0 => None,
            1 => Some(root[0].clone()),
            _ => Some(WhereNode::Composite {
                logic: Logic::And,
                children: root.clone(),
            }),
        })
    }
}
