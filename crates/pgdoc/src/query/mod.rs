//! Fluent, by-value query builder over one document type.
//!
//! Every builder call consumes the query and returns the extended state, so an
//! earlier binding never observes later calls. `Query` is `Clone`; cloning
//! copies the AST and the parameter store.
//!
//! Builder errors (unsupported expressions, unbalanced groups, bad joins) are
//! recorded on the first failing call and returned by the terminal call,
//! before any I/O.
//!
//! ```ignore
//! let tx = store.begin().await?;
//! let ducks = tx
//!     .query::<Person>()
//!     .filter(Person::LAST_NAME.eq("Duck"))
//!     .push_or()
//!     .filter(Person::AGE.lt(18))
//!     .filter(Person::AGE.gt(65))
//!     .pop()
//!     .order_by(Person::FIRST_NAME)
//!     .to_list(&tx)
//!     .await?;
//! ```

mod params;


pub use params::{BoundParameters, ParameterList};

use crate::ast::{
    Aggregate, Column, FieldRef, Join, JoinKind, JoinOn, OrderBy, SelectAst, Source, TableHint,
    WhereBuilder, WhereNode,
};
use crate::config::CountStrategy;
use crate::document::{Document, DocumentMap};
use crate::error::{DocError, DocResult};
use crate::ident::validate_identifier;
use crate::param::{ParamStore, Parameter};
use crate::retry::OperationKind;
use crate::row::FromRow;
use crate::sql::{Dialect, PreparedCommand, SqlGenerator, Statement, TOTAL_COUNT_COLUMN};
use crate::stream::DocumentStream;
use crate::transaction::DocTransaction;
use crate::translate::{Expr, Translator, parse_fragment};
use crate::value::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::Row;

/// Query builder for documents of type `T`.
pub struct Query<T> {
    map: Arc<DocumentMap>,
    ast: SelectAst,
    filter: WhereBuilder,
    store: ParamStore,
    /// Next suffix for generated `ALIAS_<hint>_<n>` names.
    aliases: u32,
    qualifier: Option<String>,
    timeout: Option<Duration>,
    tag: Option<String>,
    error: Option<Arc<DocError>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
            ast: self.ast.clone(),
            filter: self.filter.clone(),
            store: self.store.clone(),
            aliases: self.aliases,
            qualifier: self.qualifier.clone(),
            timeout: self.timeout,
            tag: self.tag.clone(),
            error: self.error.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.map.table())
            .field("ast", &self.ast)
            .field("filter", &self.filter)
            .field("params", &self.store.len())
            .field("error", &self.error)
            .finish()
    }
}

impl<T: Document> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> Query<T> {
    /// Query over `T`'s own map.
    pub fn new() -> Self {
        Self::with_map(Arc::new(T::map()))
    }

    /// Query over an already resolved map.
    pub fn with_map(map: Arc<DocumentMap>) -> Self {
        let mut ast = SelectAst::from_table(map.table());
        ast.default_order = Some(FieldRef::column(map.id_column()));
        let query = Self {
            error: None,
            ast,
            filter: WhereBuilder::new(),
            store: ParamStore::new(),
            aliases: 0,
            qualifier: None,
            timeout: None,
            tag: None,
            _marker: PhantomData,
            map,
        };
        match query.map.validate() {
            Ok(()) => query,
            Err(e) => query.fail(e),
        }
    }

    /// A query that fails with `error` at its terminal call.
    pub(crate) fn failed(map: Arc<DocumentMap>, error: DocError) -> Self {
        Self::with_map(map).fail(error)
    }

    pub fn map(&self) -> &DocumentMap {
        &self.map
    }

    /// Parameters bound so far.
    pub fn params(&self) -> &ParamStore {
        &self.store
    }

    /// The first builder error, if any call failed.
    pub fn error(&self) -> Option<&DocError> {
        self.error.as_deref()
    }

    fn fail(mut self, error: DocError) -> Self {
        if self.error.is_none() {
            self.error = Some(Arc::new(error));
        }
        self
    }

    fn check(&self) -> DocResult<()> {
        match &self.error {
            Some(error) => Err(error.replay()),
            None => Ok(()),
        }
    }

    /// Run a builder step unless an earlier step already failed.
    fn apply(mut self, step: impl FnOnce(&mut Self) -> DocResult<()>) -> Self {
        if self.error.is_some() {
            return self;
        }
        match step(&mut self) {
            Ok(()) => self,
            Err(e) => self.fail(e),
        }
    }

    fn field(&self, key: &str) -> DocResult<FieldRef> {
        Ok(self
            .map
            .field_ref(key, None)?
            .qualified(self.qualifier.as_deref()))
    }

    fn next_alias(&mut self, hint: &str) -> String {
        let alias = format!("ALIAS_{hint}_{}", self.aliases);
        self.aliases += 1;
        alias
    }

    /// Alias a terminal call would use, without reserving it.
    fn peek_alias(&self, hint: &str) -> String {
        format!("ALIAS_{hint}_{}", self.aliases)
    }

    /// Snapshot of the statement with the current where clause.
    fn compiled(&self) -> DocResult<SelectAst> {
        self.check()?;
        let mut ast = self.ast.clone();
        ast.filter = self.filter.build()?;
        Ok(ast)
    }

    /// Restart from `source`, qualifying fields with `alias`.
    fn rebase(&mut self, source: Source, alias: String) {
        self.ast = SelectAst {
            source,
            columns: Vec::new(),
            filter: None,
            order: Vec::new(),
            top: None,
            group_by: Vec::new(),
            default_order: Some(FieldRef::Column {
                qualifier: Some(alias.clone()),
                name: self.map.id_column().to_string(),
            }),
        };
        self.filter = WhereBuilder::new();
        self.qualifier = Some(alias);
    }

    // ==================== WHERE ====================

    /// Add a structured predicate. `&` chains conditions; OR needs
    /// [`Query::push_or`].
    pub fn filter(self, expr: Expr) -> Self {
        self.apply(|q| {
            let mut translator = Translator::new(&q.map, &mut q.store, q.qualifier.as_deref());
            translator.translate(&expr, &mut q.filter)
        })
    }

    /// Add a raw SQL predicate. `@name` tokens refer to parameters bound with
    /// [`Query::parameter`]; the text itself is not checked.
    pub fn filter_sql(mut self, sql: &str) -> Self {
        if self.error.is_none() {
            self.filter.add(WhereNode::Custom(parse_fragment(sql)));
        }
        self
    }

    /// `field BETWEEN start AND end`
    pub fn between(self, field: impl AsRef<str>, start: impl Into<Value>, end: impl Into<Value>) -> Self {
        self.range(field.as_ref(), start.into(), end.into(), false)
    }

    /// `field NOT BETWEEN start AND end`
    pub fn not_between(
        self,
        field: impl AsRef<str>,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        self.range(field.as_ref(), start.into(), end.into(), true)
    }

    fn range(self, key: &str, start: Value, end: Value, negated: bool) -> Self {
        self.apply(|q| {
            let field = q
                .map
                .field_ref(key, start.comparison_type())?
                .qualified(q.qualifier.as_deref());
            let base = key.replace('.', "_");
            let start = q.store.bind_unique(&base, start);
            let end = q.store.bind_unique(&base, end);
            q.filter.add(WhereNode::Binary {
                field,
                negated,
                start,
                end,
            });
            Ok(())
        })
    }

    /// `field IN (SELECT ...)`; `sub` must project exactly one column.
    pub fn filter_in_subquery<U: Document>(self, field: impl AsRef<str>, sub: Query<U>) -> Self {
        self.subquery(field.as_ref(), sub, false)
    }

    /// `field NOT IN (SELECT ...)`
    pub fn filter_not_in_subquery<U: Document>(self, field: impl AsRef<str>, sub: Query<U>) -> Self {
        self.subquery(field.as_ref(), sub, true)
    }

    fn subquery<U: Document>(self, key: &str, sub: Query<U>, negated: bool) -> Self {
        self.apply(|q| {
            let mut select = sub.compiled()?;
            if select.columns.len() != 1 {
                return Err(DocError::validation(format!(
                    "subquery on {} must select exactly one column, found {}",
                    sub.map.table(),
                    select.columns.len()
                )));
            }
            let field = q.field(key)?;
            let renames = q.store.merge(sub.store);
            select.rename_params(&renames);
            q.filter.add(WhereNode::SubQuery {
                field,
                negated,
                select: Box::new(select),
            });
            Ok(())
        })
    }

    /// Open an AND group.
    pub fn push_and(mut self) -> Self {
        self.filter.push_and();
        self
    }

    /// Open an OR group; conditions until the matching [`Query::pop`] are OR-ed.
    pub fn push_or(mut self) -> Self {
        self.filter.push_or();
        self
    }

    /// Close the innermost group. A group without conditions disappears.
    pub fn pop(self) -> Self {
        self.apply(|q| q.filter.pop())
    }

    // ==================== Parameters ====================

    /// Bind a value referenced by raw SQL as `@name`.
    pub fn parameter(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.store.set(name, value);
        self
    }

    /// Bind a value with a declared SQL type.
    pub fn typed_parameter(mut self, param: &Parameter, value: impl Into<Value>) -> Self {
        self.store.set_param(param, value);
        self
    }

    /// Reserve `count` unique parameter names derived from `name`; the values
    /// are supplied through [`ParameterList::bind_values`].
    pub fn parameter_list(mut self, name: &str, count: usize) -> ParameterList<T> {
        let params = (0..count).map(|_| self.store.unique(name)).collect();
        ParameterList::new(self, params)
    }

    /// Two unique parameters, e.g. for a raw BETWEEN.
    pub fn parameter_pair(self, name: &str) -> ParameterList<T> {
        self.parameter_list(name, 2)
    }

    pub(crate) fn bind_values_raw(mut self, values: Vec<(String, Value)>) -> Self {
        for (name, value) in values {
            self.store.set(&name, value);
        }
        self
    }

    // ==================== ORDER BY ====================

    /// Replace the ordering with `field ASC`.
    pub fn order_by(self, field: impl AsRef<str>) -> Self {
        self.order(field.as_ref(), false, true)
    }

    /// Replace the ordering with `field DESC`.
    pub fn order_by_desc(self, field: impl AsRef<str>) -> Self {
        self.order(field.as_ref(), true, true)
    }

    /// Append `field ASC` to the ordering.
    pub fn then_by(self, field: impl AsRef<str>) -> Self {
        self.order(field.as_ref(), false, false)
    }

    /// Append `field DESC` to the ordering.
    pub fn then_by_desc(self, field: impl AsRef<str>) -> Self {
        self.order(field.as_ref(), true, false)
    }

    fn order(self, key: &str, descending: bool, replace: bool) -> Self {
        self.apply(|q| {
            let field = q.field(key)?;
            if replace {
                q.ast.order.clear();
            }
            q.ast.order.push(OrderBy { field, descending });
            Ok(())
        })
    }

    // ==================== Projection ====================

    /// Project document fields. JSON properties are aliased by their key so
    /// projections can be read by name.
    pub fn select<I, F>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: AsRef<str>,
    {
        self.apply(|q| {
            let mut columns = Vec::new();
            for key in fields {
                let key = key.as_ref();
                let field = q.field(key)?;
                let alias = match field {
                    FieldRef::Json { .. } => Some(key.replace('.', "_")),
                    _ => None,
                };
                columns.push(Column::Field { field, alias });
            }
            q.ast.select(columns);
            Ok(())
        })
    }

    /// Project a field under an explicit alias.
    pub fn select_as(self, field: impl AsRef<str>, alias: &str) -> Self {
        self.apply(|q| {
            validate_identifier(alias)?;
            let field = q.field(field.as_ref())?;
            q.ast.select([Column::Field {
                field,
                alias: Some(alias.to_string()),
            }]);
            Ok(())
        })
    }

    /// Project a computed SQL expression, rendered verbatim.
    pub fn select_expr(self, sql: &str, alias: &str) -> Self {
        self.apply(|q| {
            validate_identifier(alias)?;
            q.ast.select([Column::Expression {
                sql: sql.to_string(),
                alias: alias.to_string(),
            }]);
            Ok(())
        })
    }

    /// Project an aggregate of a field.
    pub fn aggregate(self, function: Aggregate, field: impl AsRef<str>, alias: &str) -> Self {
        self.apply(|q| {
            validate_identifier(alias)?;
            let field = q.field(field.as_ref())?;
            q.ast.select([Column::Aggregate {
                function,
                field,
                alias: alias.to_string(),
            }]);
            Ok(())
        })
    }

    pub fn group_by(self, field: impl AsRef<str>) -> Self {
        self.apply(|q| {
            let field = q.field(field.as_ref())?;
            q.ast.group_by.push(field);
            Ok(())
        })
    }

    /// Limit the number of rows.
    pub fn take(mut self, count: u64) -> Self {
        self.ast.top = Some(count);
        self
    }

    // ==================== Sources ====================

    /// Attach a table hint. Only valid while the source is still the table.
    pub fn with_hint(self, hint: TableHint) -> Self {
        self.apply(|q| match &mut q.ast.source {
            Source::Table { hint: slot, .. } => {
                *slot = Some(hint);
                Ok(())
            }
            _ => Err(DocError::UnsupportedOperation(
                "table hints apply only to a table source".into(),
            )),
        })
    }

    /// Alias the table; fields are qualified with it from now on.
    pub fn alias(self, alias: &str) -> Self {
        self.apply(|q| {
            validate_identifier(alias)?;
            let Source::Table { alias: slot, .. } = &mut q.ast.source else {
                return Err(DocError::UnsupportedOperation(
                    "only a table source can be aliased".into(),
                ));
            };
            *slot = Some(alias.to_string());
            q.qualifier = Some(alias.to_string());
            q.filter.qualify(alias);
            let ast = &mut q.ast;
            for order in &mut ast.order {
                order.field.qualify(alias);
            }
            for field in &mut ast.group_by {
                field.qualify(alias);
            }
            if let Some(field) = &mut ast.default_order {
                field.qualify(alias);
            }
            for column in &mut ast.columns {
                if let Column::Field { field, .. } | Column::Aggregate { field, .. } = column {
                    field.qualify(alias);
                }
            }
            Ok(())
        })
    }

    /// Wrap the query so far in a subquery; later calls filter its result.
    pub fn nest(self) -> Self {
        self.apply(|q| {
            let inner = q.compiled()?;
            let alias = q.next_alias("nest");
            let source = Source::SubQuery {
                select: Box::new(inner),
                alias: alias.clone(),
            };
            q.rebase(source, alias);
            Ok(())
        })
    }

    /// Join another document query.
    ///
    /// Both sides are snapshotted into aliased subqueries; `on` pairs a field of
    /// this query with a field of `other`. The result keeps projecting this
    /// query's documents.
    pub fn join<U: Document>(self, other: Query<U>, kind: JoinKind, on: &[(&str, &str)]) -> Self {
        self.apply(|q| {
            other.check()?;
            if on.is_empty() {
                return Err(DocError::InvalidJoin(format!(
                    "join of {} onto {} has no ON clause",
                    other.map.table(),
                    q.map.table()
                )));
            }
            let left = q.compiled()?;
            let mut right = other.compiled()?;
            let left_alias = q.next_alias("left");
            let right_alias = q.next_alias("right");

            let mut clauses = Vec::with_capacity(on.len());
            for (l, r) in on {
                clauses.push(JoinOn {
                    left: q.map.field_ref(l, None)?.qualified(Some(&left_alias)),
                    right: other.map.field_ref(r, None)?.qualified(Some(&right_alias)),
                });
            }

            let renames = q.store.merge(other.store);
            right.rename_params(&renames);

            let source = Source::Join {
                left: Box::new(Source::SubQuery {
                    select: Box::new(left),
                    alias: left_alias.clone(),
                }),
                joins: vec![Join {
                    source: Source::SubQuery {
                        select: Box::new(right),
                        alias: right_alias,
                    },
                    kind,
                    on: clauses,
                }],
            };
            q.rebase(source, left_alias);
            Ok(())
        })
    }

    pub fn inner_join<U: Document>(self, other: Query<U>, on: &[(&str, &str)]) -> Self {
        self.join(other, JoinKind::Inner, on)
    }

    pub fn left_hash_join<U: Document>(self, other: Query<U>, on: &[(&str, &str)]) -> Self {
        self.join(other, JoinKind::LeftHash, on)
    }

    pub fn cross_apply<U: Document>(self, other: Query<U>, on: &[(&str, &str)]) -> Self {
        self.join(other, JoinKind::CrossApply, on)
    }

    /// `UNION` with another query over the same document type.
    pub fn union(self, other: Query<T>) -> Self {
        self.combine(other, false)
    }

    /// `UNION ALL` with another query over the same document type.
    pub fn union_all(self, other: Query<T>) -> Self {
        self.combine(other, true)
    }

    fn combine(self, other: Query<T>, all: bool) -> Self {
        self.apply(|q| {
            let left = q.compiled()?;
            let mut right = other.compiled()?;
            let renames = q.store.merge(other.store);
            right.rename_params(&renames);
            let alias = q.next_alias("union");
            let source = Source::Union {
                all,
                selects: vec![left, right],
                alias: alias.clone(),
            };
            q.rebase(source, alias);
            Ok(())
        })
    }

    // ==================== Execution options ====================

    /// Override the store's command timeout for this query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Tag used in statement logs.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    // ==================== Compilation ====================

    fn command(&self, statement: Statement, kind: OperationKind) -> PreparedCommand {
        let mut command = PreparedCommand::new(statement, kind).with_map(Arc::clone(&self.map));
        if let Some(timeout) = self.timeout {
            command = command.with_timeout(timeout);
        }
        if let Some(tag) = &self.tag {
            command = command.tagged(tag.clone());
        }
        command
    }

    /// The SELECT this query runs.
    pub fn to_command(&self, dialect: Dialect) -> DocResult<PreparedCommand> {
        let ast = self.compiled()?;
        let statement = SqlGenerator::new(dialect, &self.store).select(&ast)?;
        Ok(self.command(statement, OperationKind::Select))
    }

    /// The `SELECT COUNT(*)` form of this query.
    pub fn to_count_command(&self, dialect: Dialect) -> DocResult<PreparedCommand> {
        let ast = self.compiled()?;
        let alias = self.peek_alias("count");
        let statement = SqlGenerator::new(dialect, &self.store).count(&ast, &alias)?;
        Ok(self.command(statement, OperationKind::Select))
    }

    /// Rows `skip + 1 ..= skip + take` in query order.
    pub fn to_page_command(&self, dialect: Dialect, skip: u64, take: u64) -> DocResult<PreparedCommand> {
        let ast = self.compiled()?;
        let mut store = self.store.clone();
        let alias = self.peek_alias("page");
        let paged = SqlGenerator::page(&ast, &mut store, skip, take, &alias)?;
        let statement = SqlGenerator::new(dialect, &store).select(&paged)?;
        Ok(self.command(statement, OperationKind::Select))
    }

    /// Page plus `TotalCount` column in one statement.
    pub fn to_page_with_count_command(
        &self,
        dialect: Dialect,
        skip: u64,
        take: u64,
    ) -> DocResult<PreparedCommand> {
        let ast = self.compiled()?;
        let mut store = self.store.clone();
        let alias = self.peek_alias("page");
        let statement = SqlGenerator::page_with_count(dialect, &ast, &mut store, skip, take, &alias)?;
        Ok(self.command(statement, OperationKind::Select))
    }

    /// Bulk `DELETE` of every matching row.
    pub fn to_delete_command(&self, dialect: Dialect) -> DocResult<PreparedCommand> {
        let ast = self.compiled()?;
        let statement = SqlGenerator::new(dialect, &self.store).delete(&ast)?;
        Ok(self.command(statement, OperationKind::Delete))
    }

    // ==================== Terminal calls ====================

    /// Number of matching rows.
    pub async fn count(&self, tx: &DocTransaction) -> DocResult<u64> {
        let command = self.to_count_command(tx.dialect())?;
        let rows = tx.run(&command).await?;
        read_count(&rows)
    }

    /// `count() != 0`.
    pub async fn any(&self, tx: &DocTransaction) -> DocResult<bool> {
        Ok(self.count(tx).await? != 0)
    }

    /// Every matching document.
    pub async fn to_list(&self, tx: &DocTransaction) -> DocResult<Vec<T>> {
        let command = self.to_command(tx.dialect())?;
        let rows = tx.run(&command).await?;
        self.read_documents(tx, &rows)
    }

    /// First matching document; `NotFound` when nothing matches.
    pub async fn first(&self, tx: &DocTransaction) -> DocResult<T> {
        self.first_or_default(tx)
            .await?
            .ok_or_else(|| DocError::not_found(self.map.table(), "(first matching row)"))
    }

    /// First matching document, if any.
    pub async fn first_or_default(&self, tx: &DocTransaction) -> DocResult<Option<T>> {
        let documents = self.clone().take(1).to_list(tx).await?;
        Ok(documents.into_iter().next())
    }

    /// One page of documents.
    pub async fn to_list_page(&self, tx: &DocTransaction, skip: u64, take: u64) -> DocResult<Vec<T>> {
        if take == 0 {
            self.check()?;
            return Ok(Vec::new());
        }
        let command = self.to_page_command(tx.dialect(), skip, take)?;
        let rows = tx.run(&command).await?;
        self.read_documents(tx, &rows)
    }

    /// One page of documents plus the total number of matching rows.
    ///
    /// Uses the store's [`CountStrategy`]; both strategies return the same result.
    pub async fn to_list_with_count(
        &self,
        tx: &DocTransaction,
        skip: u64,
        take: u64,
    ) -> DocResult<(Vec<T>, u64)> {
        match tx.config().count_strategy {
            CountStrategy::TwoRoundTrips => {
                let items = self.to_list_page(tx, skip, take).await?;
                let total = self.count(tx).await?;
                Ok((items, total))
            }
            CountStrategy::SingleRoundTrip => {
                if take == 0 {
                    return Ok((Vec::new(), self.count(tx).await?));
                }
                let command = self.to_page_with_count_command(tx.dialect(), skip, take)?;
                let rows = tx.run(&command).await?;
                let total = match rows.first() {
                    Some(row) => row
                        .try_get::<_, i64>(TOTAL_COUNT_COLUMN)
                        .map_err(|e| DocError::decode(TOTAL_COUNT_COLUMN, e.to_string()))?
                        as u64,
                    // Past the last page the window count is unavailable.
                    None => self.count(tx).await?,
                };
                Ok((self.read_documents(tx, &rows)?, total))
            }
        }
    }

    /// Matching rows read as an arbitrary projection.
    pub async fn to_list_as<R: FromRow>(&self, tx: &DocTransaction) -> DocResult<Vec<R>> {
        let command = self.to_command(tx.dialect())?;
        let rows = tx.run(&command).await?;
        rows.iter().map(R::from_row).collect()
    }

    /// Lazy single-pass stream of documents.
    ///
    /// Each call executes the query again. The stream borrows the transaction,
    /// so it cannot outlive it.
    pub async fn stream<'t>(&self, tx: &'t DocTransaction) -> DocResult<DocumentStream<'t, T>> {
        let command = self.to_command(tx.dialect())?;
        let rows = tx.stream(&command).await?;
        Ok(DocumentStream::new(
            rows,
            Arc::clone(&self.map),
            tx.handlers().clone(),
        ))
    }

    /// Delete every matching row; returns the number of rows removed.
    ///
    /// Bypasses related-document bookkeeping.
    pub async fn delete(&self, tx: &DocTransaction) -> DocResult<u64> {
        let command = self.to_delete_command(tx.dialect())?;
        tx.execute(&command).await
    }

    fn read_documents(&self, tx: &DocTransaction, rows: &[Row]) -> DocResult<Vec<T>> {
        rows.iter()
            .map(|row| crate::row::read_document(&self.map, tx.handlers(), row))
            .collect()
    }
}

fn read_count(rows: &[Row]) -> DocResult<u64> {
    match rows.first() {
        Some(row) => {
            let count: i64 = row
                .try_get(0)
                .map_err(|e| DocError::decode("count", e.to_string()))?;
            Ok(count as u64)
        }
        None => Ok(0),
    }
}
