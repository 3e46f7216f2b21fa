use super::{FieldRef, WhereNode};
use crate::error::{DocError, DocResult};
use std::collections::HashMap;

/// Lock/locking hints attached to a table source.
///
/// PostgreSQL has no table hints; the Postgres dialect renders none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableHint {
    NoLock,
    ReadPast,
    UpdLock,
    RowLock,
    HoldLock,
}

impl TableHint {
    pub fn keyword(self) -> &'static str {
        match self {
            TableHint::NoLock => "NOLOCK",
            TableHint::ReadPast => "READPAST",
            TableHint::UpdLock => "UPDLOCK",
            TableHint::RowLock => "ROWLOCK",
            TableHint::HoldLock => "HOLDLOCK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    LeftHash,
    CrossApply,
}

/// `left = right` inside a join's ON clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOn {
    pub left: FieldRef,
    pub right: FieldRef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub source: Source,
    pub kind: JoinKind,
    pub on: Vec<JoinOn>,
}

/// The FROM part of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Table {
        name: String,
        alias: Option<String>,
        hint: Option<TableHint>,
    },
    SubQuery {
        select: Box<SelectAst>,
        alias: String,
    },
    Join {
        left: Box<Source>,
        joins: Vec<Join>,
    },
    Union {
        all: bool,
        selects: Vec<SelectAst>,
        alias: String,
    },
}

impl Source {
    pub fn table(name: impl Into<String>) -> Self {
        Source::Table {
            name: name.into(),
            alias: None,
            hint: None,
        }
    }

    /// The alias columns of this source are qualified with, if any.
    pub fn alias(&self) -> Option<&str> {
        match self {
            Source::Table { alias, .. } => alias.as_deref(),
            Source::SubQuery { alias, .. } | Source::Union { alias, .. } => Some(alias),
            Source::Join { left, .. } => left.alias(),
        }
    }

    fn rename_params(&mut self, renames: &HashMap<String, String>) {
        match self {
            Source::Table { .. } => {}
            Source::SubQuery { select, .. } => select.rename_params(renames),
            Source::Join { left, joins } => {
                left.rename_params(renames);
                for join in joins {
                    join.source.rename_params(renames);
                }
            }
            Source::Union { selects, .. } => {
                for select in selects {
                    select.rename_params(renames);
                }
            }
        }
    }

    fn validate(&self) -> DocResult<()> {
        match self {
            Source::Table { .. } => Ok(()),
            Source::SubQuery { select, .. } => select.validate(),
            Source::Join { left, joins } => {
                left.validate()?;
                for join in joins {
                    if join.on.is_empty() {
                        return Err(DocError::InvalidJoin(format!(
                            "{:?} join on '{}' has no ON clause",
                            join.kind,
                            join.source.alias().unwrap_or("?")
                        )));
                    }
                    join.source.validate()?;
                }
                Ok(())
            }
            Source::Union { selects, .. } => selects.iter().try_for_each(SelectAst::validate),
        }
    }
}

/// Aggregate functions usable in a projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aggregate {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl Aggregate {
    pub fn function(self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
            Aggregate::Avg => "AVG",
        }
    }
}

/// One projected column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// `*`
    All,
    /// `alias.*`
    AllOf(String),
    Field {
        field: FieldRef,
        alias: Option<String>,
    },
    /// Computed expression, rendered verbatim.
    Expression { sql: String, alias: String },
    Aggregate {
        function: Aggregate,
        field: FieldRef,
        alias: String,
    },
    /// `COUNT(*)`
    Count { alias: Option<String> },
    /// `ROW_NUMBER() OVER (ORDER BY ...)`
    RowNumber { order: Vec<OrderBy>, alias: String },
    /// `COUNT(*) OVER ()`
    TotalCount { alias: String },
}

impl Column {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Column::Aggregate { .. } | Column::Count { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: FieldRef,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: FieldRef) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: FieldRef) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

/// A complete SELECT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectAst {
    pub source: Source,
    /// Empty means "all columns".
    pub columns: Vec<Column>,
    pub filter: Option<WhereNode>,
    pub order: Vec<OrderBy>,
    pub top: Option<u64>,
    pub group_by: Vec<FieldRef>,
    /// Applied when `order` is empty and the projection does not aggregate.
    pub default_order: Option<FieldRef>,
}

impl SelectAst {
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            source: Source::table(table),
            columns: Vec::new(),
            filter: None,
            order: Vec::new(),
            top: None,
            group_by: Vec::new(),
            default_order: None,
        }
    }

    /// True when the projection collapses rows (aggregates or GROUP BY).
    pub fn aggregates(&self) -> bool {
        !self.group_by.is_empty() || self.columns.iter().any(Column::is_aggregate)
    }

    /// The ORDER BY that will actually be rendered.
    pub fn effective_order(&self) -> Vec<OrderBy> {
        if !self.order.is_empty() {
            return self.order.clone();
        }
        if self.aggregates() {
            return Vec::new();
        }
        self.default_order
            .iter()
            .cloned()
            .map(OrderBy::asc)
            .collect()
    }

    /// Add columns to the projection; existing columns are not repeated.
    pub fn select(&mut self, columns: impl IntoIterator<Item = Column>) {
        for column in columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
    }

    pub fn rename_params(&mut self, renames: &HashMap<String, String>) {
        if renames.is_empty() {
            return;
        }
        self.source.rename_params(renames);
        if let Some(filter) = &mut self.filter {
            filter.rename_params(renames);
        }
    }

    /// Structural checks that must hold before SQL generation.
    pub fn validate(&self) -> DocResult<()> {
        self.source.validate()?;
        if let Some(filter) = &self.filter {
            validate_node(filter)?;
        }
        Ok(())
    }
}

fn validate_node(node: &WhereNode) -> DocResult<()> {
    match node {
        WhereNode::SubQuery { select, .. } => select.validate(),
        WhereNode::Composite { children, .. } => children.iter().try_for_each(validate_node),
        _ => Ok(()),
    }
}
