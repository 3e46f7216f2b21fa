use super::{Dialect, SqlWriter, Statement};
use crate::ast::{
    Column, CompareOp, FieldRef, FragmentPart, JoinKind, JoinOn, OrderBy, SelectAst,
    Source, WhereNode,
};
use crate::error::{DocError, DocResult};
use crate::param::ParamStore;
use crate::value::Value;

/// Column name of the window-function row number used for paging.
pub const ROW_NUMBER_COLUMN: &str = "RowNumber";
/// Column name of the window-function total count used for page-with-count.
pub const TOTAL_COUNT_COLUMN: &str = "TotalCount";

/// Renders ASTs into SQL text for one dialect.
///
/// Rendering is a pure function of the AST and the parameter store: equal
/// inputs always produce byte-identical SQL.
#[derive(Debug, Clone, Copy)]
pub struct SqlGenerator<'a> {
    dialect: Dialect,
    store: &'a ParamStore,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(dialect: Dialect, store: &'a ParamStore) -> Self {
        Self { dialect, store }
    }

    /// `SELECT ...`
    pub fn select(&self, ast: &SelectAst) -> DocResult<Statement> {
        ast.validate()?;
        let mut w = SqlWriter::new(self.dialect);
        self.write_select(&mut w, ast, false)?;
        w.finish(self.store)
    }

    /// `SELECT COUNT(*) ...`
    pub fn count(&self, ast: &SelectAst, alias: &str) -> DocResult<Statement> {
        self.select(&count_ast(ast, alias))
    }

    /// Row-numbered page of `ast`: rows `[skip + 1, skip + take]`.
    ///
    /// `store` must be the query's own store; the page bounds are bound into it.
    pub fn page(
        ast: &SelectAst,
        store: &mut ParamStore,
        skip: u64,
        take: u64,
        alias: &str,
    ) -> DocResult<SelectAst> {
        page_ast(ast, store, skip, take, alias, false)
    }

    /// Single round trip page plus total count:
    /// `WITH [alias] AS (... COUNT(*) OVER () ..., ROW_NUMBER() ...) SELECT ...`.
    pub fn page_with_count(
        dialect: Dialect,
        ast: &SelectAst,
        store: &mut ParamStore,
        skip: u64,
        take: u64,
        alias: &str,
    ) -> DocResult<Statement> {
        let paged = page_ast(ast, store, skip, take, alias, true)?;
        let Source::SubQuery { select: inner, .. } = &paged.source else {
            return Err(DocError::Other("page rewrite did not produce a subquery".into()));
        };
        inner.validate()?;

        let generator = SqlGenerator::new(dialect, store);
        let mut w = SqlWriter::new(dialect);
        w.push("WITH ").ident(alias).push(" AS (");
        generator.write_select(&mut w, inner, true)?;
        w.push(") SELECT ");
        w.ident(alias).push(".* FROM ").ident(alias);
        if let Some(filter) = &paged.filter {
            w.push(" WHERE ");
            generator.write_node(&mut w, filter, true)?;
        }
        generator.write_order(&mut w, &paged.order);
        w.finish(store)
    }

    /// `DELETE FROM <table> [WHERE ...]`; only table sources can be deleted from.
    pub fn delete(&self, ast: &SelectAst) -> DocResult<Statement> {
        let (name, alias, hint) = match &ast.source {
            Source::Table { name, alias, hint } => (name, alias, hint),
            Source::Join { .. } => {
                return Err(DocError::UnsupportedOperation(
                    "cannot delete through a join".into(),
                ));
            }
            Source::SubQuery { .. } => {
                return Err(DocError::UnsupportedOperation(
                    "cannot delete through a subquery".into(),
                ));
            }
            Source::Union { .. } => {
                return Err(DocError::UnsupportedOperation(
                    "cannot delete through a union".into(),
                ));
            }
        };
        if ast.top.is_some() {
            return Err(DocError::UnsupportedOperation(
                "cannot delete with a row limit".into(),
            ));
        }
        ast.validate()?;

        let mut w = SqlWriter::new(self.dialect);
        match (self.dialect, alias) {
            (Dialect::SqlServer, Some(alias)) => {
                w.push("DELETE ").ident(alias).push(" FROM ").ident(name);
                w.push(" AS ").ident(alias);
            }
            (_, alias) => {
                w.push("DELETE FROM ").ident(name);
                if let Some(alias) = alias {
                    w.push(" AS ").ident(alias);
                }
            }
        }
        if let Some(hint) = hint.and_then(|h| self.dialect.table_hint(h)) {
            w.push(&hint);
        }
        if let Some(filter) = &ast.filter {
            w.push(" WHERE ");
            self.write_node(&mut w, filter, true)?;
        }
        w.finish(self.store)
    }

    pub(crate) fn write_select(
        &self,
        w: &mut SqlWriter,
        ast: &SelectAst,
        nested: bool,
    ) -> DocResult<()> {
        w.push("SELECT ");
        if let (Dialect::SqlServer, Some(top)) = (self.dialect, ast.top) {
            w.push(&format!("TOP ({top}) "));
        }

        if ast.columns.is_empty() {
            match source_alias(&ast.source) {
                Some(alias) => {
                    w.ident(alias).push(".*");
                }
                None => {
                    w.push("*");
                }
            }
        } else {
            for (i, column) in ast.columns.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                self.write_column(w, column);
            }
        }

        w.push(" FROM ");
        self.write_source(w, &ast.source)?;

        if let Some(filter) = &ast.filter {
            w.push(" WHERE ");
            self.write_node(w, filter, true)?;
        }

        if !ast.group_by.is_empty() {
            w.push(" GROUP BY ");
            for (i, field) in ast.group_by.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                self.write_field(w, field);
            }
        }

        // Subqueries only keep their order when it limits rows.
        if !nested || ast.top.is_some() {
            self.write_order(w, &ast.effective_order());
        }

        if let (Dialect::Postgres, Some(top)) = (self.dialect, ast.top) {
            w.push(&format!(" LIMIT {top}"));
        }
        Ok(())
    }

    fn write_order(&self, w: &mut SqlWriter, order: &[OrderBy]) {
        if order.is_empty() {
            return;
        }
        w.push(" ORDER BY ");
        self.write_order_list(w, order);
    }

    fn write_order_list(&self, w: &mut SqlWriter, order: &[OrderBy]) {
        for (i, item) in order.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            self.write_field(w, &item.field);
            w.push(if item.descending { " DESC" } else { " ASC" });
        }
    }

    fn write_column(&self, w: &mut SqlWriter, column: &Column) {
        match column {
            Column::All => {
                w.push("*");
            }
            Column::AllOf(alias) => {
                w.ident(alias).push(".*");
            }
            Column::Field { field, alias } => {
                self.write_field(w, field);
                if let Some(alias) = alias {
                    w.push(" AS ").ident(alias);
                }
            }
            Column::Expression { sql, alias } => {
                w.push(sql).push(" AS ").ident(alias);
            }
            Column::Aggregate {
                function,
                field,
                alias,
            } => {
                w.push(function.function()).push("(");
                self.write_field(w, field);
                w.push(") AS ").ident(alias);
            }
            Column::Count { alias } => {
                w.push("COUNT(*)");
                if let Some(alias) = alias {
                    w.push(" AS ").ident(alias);
                }
            }
            Column::RowNumber { order, alias } => {
                w.push("ROW_NUMBER() OVER (ORDER BY ");
                self.write_order_list(w, order);
                w.push(") AS ").ident(alias);
            }
            Column::TotalCount { alias } => {
                w.push("COUNT(*) OVER () AS ").ident(alias);
            }
        }
    }

    pub(crate) fn write_field(&self, w: &mut SqlWriter, field: &FieldRef) {
        let text = match field {
            FieldRef::Column { qualifier, name } => self.dialect.column(qualifier.as_deref(), name),
            FieldRef::Json {
                qualifier,
                column,
                path,
                cast,
            } => self
                .dialect
                .json_value(qualifier.as_deref(), column, path, cast.as_ref()),
            FieldRef::Raw(sql) => sql.clone(),
        };
        w.push(&text);
    }

    fn write_source(&self, w: &mut SqlWriter, source: &Source) -> DocResult<()> {
        match source {
            Source::Table { name, alias, hint } => {
                w.ident(name);
                if let Some(alias) = alias {
                    w.push(" AS ").ident(alias);
                }
                if let Some(hint) = hint.and_then(|h| self.dialect.table_hint(h)) {
                    w.push(&hint);
                }
            }
            Source::SubQuery { select, alias } => {
                w.push("(");
                self.write_select(w, select, true)?;
                w.push(") AS ").ident(alias);
            }
            Source::Join { left, joins } => {
                self.write_source(w, left)?;
                for join in joins {
                    w.push(self.dialect.join_keyword(join.kind));
                    if join.kind == JoinKind::CrossApply {
                        self.write_cross_apply(w, &join.source, &join.on)?;
                    } else {
                        self.write_source(w, &join.source)?;
                        w.push(" ON ");
                        self.write_join_on(w, &join.on);
                    }
                }
            }
            Source::Union {
                all,
                selects,
                alias,
            } => {
                w.push("(");
                for (i, select) in selects.iter().enumerate() {
                    if i > 0 {
                        w.push(if *all { " UNION ALL " } else { " UNION " });
                    }
                    self.write_select(w, select, true)?;
                }
                w.push(") AS ").ident(alias);
            }
        }
        Ok(())
    }

    /// `(SELECT [a].* FROM <source> WHERE <on>) AS [a]`
    fn write_cross_apply(&self, w: &mut SqlWriter, source: &Source, on: &[JoinOn]) -> DocResult<()> {
        let Some(alias) = source.alias() else {
            return Err(DocError::InvalidJoin(
                "cross apply requires an aliased source".into(),
            ));
        };
        w.push("(SELECT ").ident(alias).push(".* FROM ");
        self.write_source(w, source)?;
        w.push(" WHERE ");
        self.write_join_on(w, on);
        w.push(") AS ").ident(alias);
        Ok(())
    }

    fn write_join_on(&self, w: &mut SqlWriter, on: &[JoinOn]) {
        for (i, clause) in on.iter().enumerate() {
            if i > 0 {
                w.push(" AND ");
            }
            self.write_field(w, &clause.left);
            w.push(" = ");
            self.write_field(w, &clause.right);
        }
    }

    pub(crate) fn write_node(&self, w: &mut SqlWriter, node: &WhereNode, root: bool) -> DocResult<()> {
        match node {
            WhereNode::Unary { field, op, param } => {
                self.write_field(w, field);
                match op {
                    CompareOp::Like { kind, negated } => {
                        w.push(if *negated { " NOT LIKE " } else { " LIKE " });
                        w.like_param(param, *kind);
                    }
                    op => {
                        w.push(comparison(*op)).param(param);
                    }
                }
            }
            WhereNode::Binary {
                field,
                negated,
                start,
                end,
            } => {
                self.write_field(w, field);
                w.push(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                w.param(start).push(" AND ").param(end);
            }
            WhereNode::Array {
                field,
                negated,
                param,
            } => self.write_array(w, field, *negated, param)?,
            WhereNode::Custom(fragment) => {
                if !root {
                    w.push("(");
                }
                for part in &fragment.parts {
                    match part {
                        FragmentPart::Raw(text) => w.push(text),
                        FragmentPart::Param(name) => w.param(name),
                    };
                }
                if !root {
                    w.push(")");
                }
            }
            WhereNode::IsNull { field, negated } => {
                self.write_field(w, field);
                w.push(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            WhereNode::SubQuery {
                field,
                negated,
                select,
            } => {
                self.write_field(w, field);
                w.push(if *negated { " NOT IN (" } else { " IN (" });
                self.write_select(w, select, true)?;
                w.push(")");
            }
            WhereNode::Composite { logic, children } => {
                if !root {
                    w.push("(");
                }
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        w.push(logic.keyword());
                    }
                    self.write_node(w, child, false)?;
                }
                if !root {
                    w.push(")");
                }
            }
        }
        Ok(())
    }

    fn write_array(
        &self,
        w: &mut SqlWriter,
        field: &FieldRef,
        negated: bool,
        param: &str,
    ) -> DocResult<()> {
        let value = self
            .store
            .get(param)
            .ok_or_else(|| DocError::validation(format!("parameter @{param} has no value")))?;

        // IN () is not valid SQL; an empty set matches nothing (or everything, negated).
        if value.elements().is_some_and(<[Value]>::is_empty) {
            w.push(if negated { "1 = 1" } else { "0 = 1" });
            return Ok(());
        }

        self.write_field(w, field);
        match value {
            Value::Table(_) if self.dialect == Dialect::Postgres => {
                w.push(if negated { " <> ALL(" } else { " = ANY(" });
                w.param(param).push(")");
            }
            Value::List(_) | Value::Table(_) => {
                w.push(if negated { " NOT IN " } else { " IN " });
                w.param(param);
            }
            _ => {
                w.push(if negated { " NOT IN (" } else { " IN (" });
                w.param(param).push(")");
            }
        }
        Ok(())
    }
}

fn comparison(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => " = ",
        CompareOp::Ne => " <> ",
        CompareOp::Lt => " < ",
        CompareOp::Le => " <= ",
        CompareOp::Gt => " > ",
        CompareOp::Ge => " >= ",
        CompareOp::Like { negated: false, .. } => " LIKE ",
        CompareOp::Like { negated: true, .. } => " NOT LIKE ",
    }
}

/// Alias used for `alias.*` when the projection is left at "all columns".
fn source_alias(source: &Source) -> Option<&str> {
    match source {
        Source::Table { .. } => None,
        other => other.alias(),
    }
}

/// Rewrite `ast` into its COUNT(*) form.
///
/// Limited or grouped queries are counted through a subquery; otherwise the
/// projection is replaced and the order dropped.
pub fn count_ast(ast: &SelectAst, alias: &str) -> SelectAst {
    if ast.top.is_some() || ast.aggregates() {
        let mut inner = ast.clone();
        if inner.top.is_none() {
            inner.order.clear();
        }
        return SelectAst {
            source: Source::SubQuery {
                select: Box::new(inner),
                alias: alias.to_string(),
            },
            columns: vec![Column::Count { alias: None }],
            filter: None,
            order: Vec::new(),
            top: None,
            group_by: Vec::new(),
            default_order: None,
        };
    }
    let mut counted = ast.clone();
    counted.columns = vec![Column::Count { alias: None }];
    counted.order.clear();
    counted.default_order = None;
    counted
}

fn row_bound(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn page_ast(
    ast: &SelectAst,
    store: &mut ParamStore,
    skip: u64,
    take: u64,
    alias: &str,
    with_total: bool,
) -> DocResult<SelectAst> {
    let order = ast.effective_order();
    if order.is_empty() {
        return Err(DocError::validation(
            "paging requires a deterministic order; add order_by() before paging an aggregate",
        ));
    }

    let mut inner = ast.clone();
    inner.order.clear();
    inner.default_order = None;
    if inner.columns.is_empty() {
        inner.columns.push(match source_alias(&inner.source) {
            Some(alias) => Column::AllOf(alias.to_string()),
            None => Column::All,
        });
    }
    if with_total {
        inner.columns.push(Column::TotalCount {
            alias: TOTAL_COUNT_COLUMN.to_string(),
        });
    }
    inner.columns.push(Column::RowNumber {
        order,
        alias: ROW_NUMBER_COLUMN.to_string(),
    });

    // Row numbers are bigint; bounds past i64::MAX clamp to it.
    let start = store.bind_unique("page_start", Value::BigInt(row_bound(skip.saturating_add(1))));
    let end = store.bind_unique("page_end", Value::BigInt(row_bound(skip.saturating_add(take))));
    let row_number = FieldRef::Column {
        qualifier: Some(alias.to_string()),
        name: ROW_NUMBER_COLUMN.to_string(),
    };

    Ok(SelectAst {
        source: Source::SubQuery {
            select: Box::new(inner),
            alias: alias.to_string(),
        },
        columns: vec![Column::AllOf(alias.to_string())],
        filter: Some(WhereNode::Binary {
            field: row_number.clone(),
            negated: false,
            start,
            end,
        }),
        order: vec![OrderBy::asc(row_number)],
        top: None,
        group_by: Vec::new(),
        default_order: None,
    })
}

