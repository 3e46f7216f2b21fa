//! Query AST: an immutable description of a SELECT/DELETE statement.
//!
//! Nodes are plain values. Builders clone and extend them; nothing here is
//! shared mutably between queries.

mod select;
mod where_clause;

pub use select::{Aggregate, Column, Join, JoinKind, JoinOn, OrderBy, SelectAst, Source, TableHint};
pub use where_clause::{
    CompareOp, Fragment, FragmentPart, LikeKind, Logic, WhereBuilder, WhereNode,
};

use crate::types::SqlType;

/// A reference to a value inside a row.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// A real column (the id or an indexed column).
    Column {
        qualifier: Option<String>,
        name: String,
    },
    /// A property inside the JSON blob column.
    Json {
        qualifier: Option<String>,
        column: String,
        path: Vec<String>,
        cast: Option<SqlType>,
    },
    /// Verbatim SQL expression (aggregates, computed columns).
    Raw(String),
}

impl FieldRef {
    pub fn column(name: impl Into<String>) -> Self {
        FieldRef::Column {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn json(column: impl Into<String>, path: Vec<String>, cast: Option<SqlType>) -> Self {
        FieldRef::Json {
            qualifier: None,
            column: column.into(),
            path,
            cast,
        }
    }

    /// Qualify with a table alias unless already qualified.
    pub fn qualify(&mut self, alias: &str) {
        match self {
            FieldRef::Column { qualifier, .. } | FieldRef::Json { qualifier, .. } => {
                if qualifier.is_none() {
                    *qualifier = Some(alias.to_string());
                }
            }
            FieldRef::Raw(_) => {}
        }
    }

    pub fn qualified(mut self, alias: Option<&str>) -> Self {
        if let Some(alias) = alias {
            self.qualify(alias);
        }
        self
    }

    /// The bare column name, if this is a column reference.
    pub fn column_name(&self) -> Option<&str> {
        match self {
            FieldRef::Column { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
