//! Execution layer: one connection, one open transaction.
//!
//! Every statement a [`DocTransaction`] issues goes through the same path:
//! the command timeout and [`CancelSignal`] are enforced around the driver
//! call, the statement is recorded in the transaction's [`StatementTrace`],
//! and driver errors are classified into [`DocError`] variants callers can
//! match on. Commands whose [`OperationKind`] is retryable run under the
//! store's retry policy, each attempt inside its own savepoint so a failed
//! attempt leaves the transaction usable.
//!
//! ```ignore
//! let tx = store.begin().await?;
//! let mut duck = Person::new("Donald", "Duck");
//! tx.insert(&mut duck).await?;
//! let ducks = tx
//!     .query::<Person>()
//!     .filter(Person::LAST_NAME.eq("Duck"))
//!     .to_list(&tx)
//!     .await?;
//! tx.commit().await?;
//! ```

mod classify;
mod registry;
mod trace;

pub use registry::TransactionRegistry;
pub use trace::{StatementTrace, TracedStatement};

use crate::client::{GenericClient, RowStream, StreamingClient};
use crate::config::{StoreConfig, TransactionOptions};
use crate::document::{Document, DocumentMap};
use crate::error::{DocError, DocResult};
use crate::query::Query;
use crate::related::SavedDocument;
use crate::retry::OperationKind;
use crate::row::read_document;
use crate::sql::{self, Dialect, PreparedCommand};
use crate::store::Shared;
use crate::types::TypeHandlerRegistry;
use registry::TransactionState;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Runs the given block inside a [`DocTransaction`] opened on `$store`.
///
/// - Begins a transaction via `$store.begin().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `pgdoc::DocResult<T>`.
///
/// ```ignore
/// let id = pgdoc::transaction!(store, tx, {
///     let mut duck = Person::new("Donald", "Duck");
///     tx.insert(&mut duck).await
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($store:expr, $tx:ident, $body:block) => {{
        let $tx = ($store).begin().await?;

        let __pgdoc_tx_body_result = async { $body }.await;
        match __pgdoc_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DocError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Runs the given block inside a savepoint of an open [`DocTransaction`].
///
/// Releases on `Ok(_)`, rolls back to the savepoint on `Err(_)`; the outer
/// transaction stays usable either way.
#[macro_export]
macro_rules! savepoint {
    ($tx:expr, $body:block) => {{
        let __pgdoc_sp = ($tx).savepoint().await?;

        let __pgdoc_sp_body_result = async { $body }.await;
        match __pgdoc_sp_body_result {
            Ok(value) => {
                __pgdoc_sp.release().await?;
                Ok(value)
            }
            Err(error) => match __pgdoc_sp.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::DocError::Other(format!(
                    "{error} (savepoint rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}

/// Requests cancellation of whatever a transaction is currently running.
///
/// Obtained from [`DocTransaction::cancel_signal`]; clone it freely. Once
/// raised, the running statement is cancelled server-side and every later
/// statement on the transaction fails with [`DocError::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (sender, receiver) = watch::channel(false);
        (
            Self {
                sender: Arc::new(sender),
            },
            receiver,
        )
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// The physical connection a transaction runs on.
pub(crate) enum Connection {
    Direct(tokio_postgres::Client),
    #[cfg(feature = "pool")]
    Pooled(deadpool_postgres::Client),
}

impl GenericClient for Connection {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<Vec<Row>> {
        match self {
            Self::Direct(client) => GenericClient::query(client, sql, params).await,
            #[cfg(feature = "pool")]
            Self::Pooled(client) => GenericClient::query(client, sql, params).await,
        }
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<u64> {
        match self {
            Self::Direct(client) => GenericClient::execute(client, sql, params).await,
            #[cfg(feature = "pool")]
            Self::Pooled(client) => GenericClient::execute(client, sql, params).await,
        }
    }

    async fn batch_execute(&self, sql: &str) -> DocResult<()> {
        match self {
            Self::Direct(client) => GenericClient::batch_execute(client, sql).await,
            #[cfg(feature = "pool")]
            Self::Pooled(client) => GenericClient::batch_execute(client, sql).await,
        }
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        match self {
            Self::Direct(client) => GenericClient::cancel_token(client),
            #[cfg(feature = "pool")]
            Self::Pooled(client) => GenericClient::cancel_token(client),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Self::Direct(client) => GenericClient::is_closed(client),
            #[cfg(feature = "pool")]
            Self::Pooled(client) => GenericClient::is_closed(client),
        }
    }
}

impl StreamingClient for Connection {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DocResult<RowStream> {
        match self {
            Self::Direct(client) => StreamingClient::query_stream(client, sql, params).await,
            #[cfg(feature = "pool")]
            Self::Pooled(client) => StreamingClient::query_stream(client, sql, params).await,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Call {
    Query,
    Execute,
    Stream,
}

enum Output {
    Rows(Vec<Row>),
    Affected(u64),
    Stream(RowStream),
}

fn mismatch(call: Call) -> DocError {
    DocError::Other(format!("driver returned the wrong output for {call:?}"))
}

/// A savepoint inside a [`DocTransaction`]; see also [`savepoint!`](crate::savepoint).
///
/// Dropping it without `release` or `rollback` leaves the savepoint open
/// until the transaction ends.
#[must_use = "release or roll back the savepoint"]
pub struct Savepoint<'t> {
    tx: &'t DocTransaction,
    name: String,
}

impl Savepoint<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn release(self) -> DocResult<()> {
        self.tx
            .control(&format!("RELEASE SAVEPOINT {}", self.name))
            .await
    }

    pub async fn rollback(self) -> DocResult<()> {
        self.tx
            .control(&format!("ROLLBACK TO SAVEPOINT {}", self.name))
            .await
    }
}

/// One open transaction on one connection.
///
/// Not committed unless [`commit`](Self::commit) is called: dropping it rolls
/// back and logs a warning.
pub struct DocTransaction {
    connection: Option<Connection>,
    shared: Arc<Shared>,
    id: u64,
    state: Arc<TransactionState>,
    cancel: CancelSignal,
    cancelled: watch::Receiver<bool>,
    savepoints: AtomicU32,
    finished: bool,
}

impl std::fmt::Debug for DocTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocTransaction")
            .field("name", &self.state.name)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl DocTransaction {
    pub(crate) async fn begin(
        shared: Arc<Shared>,
        connection: Connection,
        options: TransactionOptions,
    ) -> DocResult<Self> {
        let (id, state) = shared.registry.register(shared.config.trace_capacity);
        let (cancel, cancelled) = CancelSignal::new();
        let mut tx = Self {
            connection: Some(connection),
            shared,
            id,
            state,
            cancel,
            cancelled,
            savepoints: AtomicU32::new(0),
            finished: false,
        };
        let begun = tx.control(&options.begin_sql()).await;
        if begun.is_err() {
            // Nothing to roll back.
            tx.finished = true;
        }
        begun.map(|()| tx)
    }

    /// Diagnostic name, as it appears in logs and deadlock dumps.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Dialect statements are rendered in.
    pub fn dialect(&self) -> Dialect {
        self.shared.config.dialect
    }

    pub fn config(&self) -> &StoreConfig {
        &self.shared.config
    }

    pub fn handlers(&self) -> &TypeHandlerRegistry {
        &self.shared.handlers
    }

    /// Statements issued so far.
    pub fn trace(&self) -> StatementTrace {
        self.state.trace().clone()
    }

    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Start a query over `T`'s table.
    pub fn query<T: Document>(&self) -> Query<T> {
        match self.shared.maps.resolve::<T>() {
            Ok(map) => Query::with_map(map),
            Err(error) => Query::failed(Arc::new(T::map()), error),
        }
    }

    pub async fn commit(mut self) -> DocResult<()> {
        self.finished = true;
        self.control("COMMIT").await
    }

    pub async fn rollback(mut self) -> DocResult<()> {
        self.finished = true;
        self.control("ROLLBACK").await
    }

    pub async fn savepoint(&self) -> DocResult<Savepoint<'_>> {
        let n = self.savepoints.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("pgdoc_sp_{n}");
        self.control(&format!("SAVEPOINT {name}")).await?;
        Ok(Savepoint { tx: self, name })
    }

    // ===== document operations =====

    /// Insert `document`, allocating an id first when it has none.
    ///
    /// Returns the document's id.
    pub async fn insert<T: Document>(&self, document: &mut T) -> DocResult<i64> {
        let map = self.shared.maps.resolve::<T>()?;
        if document.id() == 0 {
            let id = self.shared.keys.next_id(map.table()).await?;
            document.set_id(id);
        }
        self.write(&map, document, OperationKind::Insert).await?;
        Ok(document.id())
    }

    /// Insert `document` under an explicit id.
    ///
    /// Fails with [`DocError::IdConflict`] if the document already carries a
    /// different id.
    pub async fn insert_with_id<T: Document>(&self, document: &mut T, id: i64) -> DocResult<()> {
        if id <= 0 {
            return Err(DocError::validation(format!("explicit id must be positive, got {id}")));
        }
        let existing = document.id();
        if existing != 0 && existing != id {
            return Err(DocError::IdConflict {
                existing,
                requested: id,
            });
        }
        let map = self.shared.maps.resolve::<T>()?;
        document.set_id(id);
        self.write(&map, document, OperationKind::Insert).await
    }

    /// Write every column and the blob of an existing document.
    pub async fn update<T: Document>(&self, document: &T) -> DocResult<()> {
        let map = self.shared.maps.resolve::<T>()?;
        if document.id() == 0 {
            return Err(DocError::UnsupportedOperation(format!(
                "cannot update a {} that has no id",
                map.type_name()
            )));
        }
        self.write(&map, document, OperationKind::Update).await
    }

    async fn write<T: Document>(
        &self,
        map: &Arc<DocumentMap>,
        document: &T,
        kind: OperationKind,
    ) -> DocResult<()> {
        let id = document.id();
        let json = serde_json::to_value(document)?;
        let split = map.split(json.clone(), &self.shared.handlers)?;
        let discriminator = document.discriminator();
        let (statement, tag) = match kind {
            OperationKind::Update => (
                sql::document::update(self.dialect(), map, id, &split, discriminator)?,
                "update",
            ),
            _ => (
                sql::document::insert(self.dialect(), map, id, &split, discriminator)?,
                "insert",
            ),
        };
        let command = PreparedCommand::new(statement, kind)
            .with_map(Arc::clone(map))
            .tagged(tag);
        let affected = self.execute(&command).await?;
        if affected == 0 {
            return Err(DocError::not_found(map.table(), id));
        }

        if let Some(related) = &self.shared.related {
            let mut document = json;
            if let serde_json::Value::Object(object) = &mut document {
                object.insert(map.id_key().to_string(), serde_json::Value::from(id));
            }
            related
                .on_saved(
                    self,
                    SavedDocument {
                        table: map.table(),
                        id,
                        document: &document,
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Delete one document by id; `false` if there was nothing to delete.
    pub async fn delete_by_id<T: Document>(&self, id: i64) -> DocResult<bool> {
        let map = self.shared.maps.resolve::<T>()?;
        let statement = sql::document::delete_by_id(self.dialect(), &map, id)?;
        let command = PreparedCommand::new(statement, OperationKind::Delete)
            .with_map(map)
            .tagged("delete");
        Ok(self.execute(&command).await? > 0)
    }

    pub async fn load<T: Document>(&self, id: i64) -> DocResult<Option<T>> {
        let map = self.shared.maps.resolve::<T>()?;
        let statement = sql::document::load(self.dialect(), &map, id)?;
        let command = PreparedCommand::new(statement, OperationKind::Select)
            .with_map(Arc::clone(&map))
            .tagged("load");
        let rows = self.run(&command).await?;
        rows.first()
            .map(|row| read_document(&map, &self.shared.handlers, row))
            .transpose()
    }

    /// Like [`load`](Self::load), but a missing document is [`DocError::NotFound`].
    pub async fn load_required<T: Document>(&self, id: i64) -> DocResult<T> {
        match self.load::<T>(id).await? {
            Some(document) => Ok(document),
            None => {
                let map = self.shared.maps.resolve::<T>()?;
                Err(DocError::not_found(map.table(), id))
            }
        }
    }

    /// Every document among `ids` that exists, ordered by id.
    pub async fn load_many<T: Document>(&self, ids: &[i64]) -> DocResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let map = self.shared.maps.resolve::<T>()?;
        let statement = sql::document::load_many(self.dialect(), &map, ids)?;
        let command = PreparedCommand::new(statement, OperationKind::Select)
            .with_map(Arc::clone(&map))
            .tagged("load_many");
        let rows = self.run(&command).await?;
        rows.iter()
            .map(|row| read_document(&map, &self.shared.handlers, row))
            .collect()
    }

    /// Like [`load_many`](Self::load_many), but fails with
    /// [`DocError::NotFound`] for the first id in `ids` that does not exist.
    pub async fn load_many_required<T: Document>(&self, ids: &[i64]) -> DocResult<Vec<T>> {
        let documents = self.load_many::<T>(ids).await?;
        if let Some(missing) = first_missing(ids, documents.iter().map(Document::id)) {
            let map = self.shared.maps.resolve::<T>()?;
            return Err(DocError::not_found(map.table(), missing));
        }
        Ok(documents)
    }

    /// Reserve the next id for `T`'s table without inserting anything.
    pub async fn next_id<T: Document>(&self) -> DocResult<i64> {
        let map = self.shared.maps.resolve::<T>()?;
        self.shared.keys.next_id(map.table()).await
    }

    // ===== statement execution =====

    /// Run a command and collect every row.
    pub async fn run(&self, command: &PreparedCommand) -> DocResult<Vec<Row>> {
        match self.dispatch(command, Call::Query).await? {
            Output::Rows(rows) => Ok(rows),
            _ => Err(mismatch(Call::Query)),
        }
    }

    /// Run a command and return the number of affected rows.
    pub async fn execute(&self, command: &PreparedCommand) -> DocResult<u64> {
        match self.dispatch(command, Call::Execute).await? {
            Output::Affected(n) => Ok(n),
            _ => Err(mismatch(Call::Execute)),
        }
    }

    /// Run a command and stream its rows.
    ///
    /// Streams are never retried: rows may already have been consumed.
    pub async fn stream(&self, command: &PreparedCommand) -> DocResult<RowStream> {
        let connection = self.connection()?;
        match self.attempt(connection, command, Call::Stream).await? {
            Output::Stream(rows) => Ok(rows),
            _ => Err(mismatch(Call::Stream)),
        }
    }

    async fn dispatch(&self, command: &PreparedCommand, call: Call) -> DocResult<Output> {
        let connection = self.connection()?;
        let retry = &self.shared.retry;
        if !retry.retries(command.kind()) {
            return self.attempt(connection, command, call).await;
        }
        retry
            .execute(command.kind(), || self.guarded(connection, command, call))
            .await
    }

    async fn guarded(
        &self,
        connection: &Connection,
        command: &PreparedCommand,
        call: Call,
    ) -> DocResult<Output> {
        let savepoint = self.savepoint().await?;
        match self.attempt(connection, command, call).await {
            Ok(output) => {
                savepoint.release().await?;
                Ok(output)
            }
            Err(error) => {
                // A failed rollback means the connection is gone; the
                // statement error is the one worth reporting.
                let _ = savepoint.rollback().await;
                Err(error)
            }
        }
    }

    async fn attempt(
        &self,
        connection: &Connection,
        command: &PreparedCommand,
        call: Call,
    ) -> DocResult<Output> {
        let timeout = command.timeout().or(self.shared.config.command_timeout);
        let params = command.as_refs();
        let sql = command.sql();
        let started = Instant::now();
        let result = self
            .guard(connection, timeout, async {
                Ok(match call {
                    Call::Query => Output::Rows(connection.query(sql, &params).await?),
                    Call::Execute => Output::Affected(connection.execute(sql, &params).await?),
                    Call::Stream => Output::Stream(connection.query_stream(sql, &params).await?),
                })
            })
            .await;
        self.finish(sql, command.tag(), command.map(), started, result)
    }

    /// Issue a parameterless control statement (BEGIN, COMMIT, SAVEPOINT...).
    async fn control(&self, sql: &str) -> DocResult<()> {
        let connection = self.connection()?;
        let started = Instant::now();
        let result = self
            .guard(connection, self.shared.config.command_timeout, async {
                connection.batch_execute(sql).await
            })
            .await;
        self.finish(sql, None, None, started, result)
    }

    fn finish<R>(
        &self,
        sql: &str,
        tag: Option<&str>,
        map: Option<&DocumentMap>,
        started: Instant,
        result: DocResult<R>,
    ) -> DocResult<R> {
        let elapsed = started.elapsed();
        self.state.record(TracedStatement {
            sql: sql.to_string(),
            tag: tag.map(str::to_string),
            elapsed,
            succeeded: result.is_ok(),
        });
        crate::logging::statement(&self.state.name, tag, sql, elapsed);
        result.map_err(|error| {
            classify::classify(error, sql, &self.state.name, map, &self.shared.registry)
        })
    }

    /// Enforce the timeout and cancel signal around one driver call.
    async fn guard<R>(
        &self,
        connection: &Connection,
        timeout: Option<Duration>,
        call: impl Future<Output = DocResult<R>>,
    ) -> DocResult<R> {
        if *self.cancelled.borrow() {
            return Err(DocError::Cancelled);
        }
        let mut cancelled = self.cancelled.clone();
        let bounded = async {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => {
                        cancel_running(connection);
                        Err(DocError::Timeout(limit))
                    }
                },
                None => call.await,
            }
        };
        tokio::select! {
            result = bounded => result,
            _ = wait_cancelled(&mut cancelled) => {
                cancel_running(connection);
                Err(DocError::Cancelled)
            }
        }
    }

    fn connection(&self) -> DocResult<&Connection> {
        self.connection
            .as_ref()
            .ok_or_else(|| DocError::Connection("transaction has no connection".to_string()))
    }
}

async fn wait_cancelled(cancelled: &mut watch::Receiver<bool>) {
    if cancelled.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Ask the server to cancel whatever the connection is running.
fn cancel_running(connection: &Connection) {
    if let Some(token) = connection.cancel_token() {
        tokio::spawn(async move {
            let _ = token.cancel_query(tokio_postgres::NoTls).await;
        });
    }
}

fn first_missing(requested: &[i64], found: impl Iterator<Item = i64>) -> Option<i64> {
    let found: std::collections::HashSet<i64> = found.collect();
    requested.iter().copied().find(|id| !found.contains(id))
}

impl Drop for DocTransaction {
    fn drop(&mut self) {
        self.shared.registry.unregister(self.id);
        if self.finished {
            return;
        }
        crate::logging::dropped_transaction(&self.state.name, self.state.trace().total());
        let Some(connection) = self.connection.take() else {
            return;
        };
        if connection.is_closed() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = connection.batch_execute("ROLLBACK").await;
                });
            }
            // Without a runtime the connection cannot be rolled back here;
            // keep it out of the pool so the server aborts the transaction
            // when it closes.
            Err(_) => match connection {
                Connection::Direct(client) => drop(client),
                #[cfg(feature = "pool")]
                Connection::Pooled(client) => drop(deadpool_postgres::Object::take(client)),
            },
        }
    }
}
