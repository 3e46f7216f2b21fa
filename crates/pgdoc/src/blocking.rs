//! Synchronous wrappers over [`DocumentStore`] and [`DocTransaction`].
//!
//! Each wrapper drives the async implementation on a current-thread Tokio
//! runtime owned by the store, so the blocking path issues the same
//! statements and returns the same results. Do not call these from inside
//! an async context; `block_on` panics there.
//!
//! ```ignore
//! let store = BlockingStore::connect(&database_url, StoreConfig::default())?;
//! let tx = store.begin()?;
//! let mut duck = Person::new("Donald", "Duck");
//! tx.insert(&mut duck)?;
//! let ducks = tx.to_list(&tx.query::<Person>().filter(Person::LAST_NAME.eq("Duck")))?;
//! tx.commit()?;
//! ```

use crate::config::{StoreConfig, TransactionOptions};
use crate::document::Document;
use crate::error::{DocError, DocResult};
use crate::query::Query;
use crate::row::FromRow;
use crate::store::DocumentStore;
use crate::transaction::DocTransaction;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn runtime() -> DocResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DocError::Other(format!("failed to start blocking runtime: {e}")))
}

/// A [`DocumentStore`] driven from synchronous code.
#[derive(Debug, Clone)]
pub struct BlockingStore {
    store: DocumentStore,
    runtime: Arc<Runtime>,
}

impl BlockingStore {
    /// Wrap an existing store.
    ///
    /// Its pooled connections are driven by this wrapper's runtime; do not
    /// share the store with async callers running elsewhere.
    pub fn new(store: DocumentStore) -> DocResult<Self> {
        Ok(Self {
            store,
            runtime: Arc::new(runtime()?),
        })
    }

    #[cfg(feature = "pool")]
    pub fn connect(database_url: &str, config: StoreConfig) -> DocResult<Self> {
        Self::new(DocumentStore::connect(database_url, config)?)
    }

    #[cfg(feature = "pool")]
    pub fn begin(&self) -> DocResult<BlockingTransaction> {
        let tx = self.runtime.block_on(self.store.begin())?;
        Ok(self.wrap(tx))
    }

    #[cfg(feature = "pool")]
    pub fn begin_with(&self, options: TransactionOptions) -> DocResult<BlockingTransaction> {
        let tx = self.runtime.block_on(self.store.begin_with(options))?;
        Ok(self.wrap(tx))
    }

    /// Open a transaction on a connection established with `connect`.
    pub fn begin_on(
        &self,
        database_url: &str,
        options: TransactionOptions,
    ) -> DocResult<BlockingTransaction> {
        let tx = self.runtime.block_on(async {
            let (client, connection) = tokio_postgres::connect(database_url, tokio_postgres::NoTls)
                .await
                .map_err(|e| DocError::Connection(e.to_string()))?;
            tokio::spawn(async move {
                let _ = connection.await;
            });
            self.store.begin_on(client, options).await
        })?;
        Ok(self.wrap(tx))
    }

    pub fn next_id<T: Document>(&self) -> DocResult<i64> {
        self.runtime.block_on(self.store.next_id::<T>())
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn wrap(&self, tx: DocTransaction) -> BlockingTransaction {
        BlockingTransaction {
            tx: Some(tx),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// A [`DocTransaction`] driven from synchronous code.
///
/// Dropping it without `commit` rolls back before returning.
#[derive(Debug)]
pub struct BlockingTransaction {
    tx: Option<DocTransaction>,
    runtime: Arc<Runtime>,
}

impl BlockingTransaction {
    fn tx(&self) -> DocResult<&DocTransaction> {
        self.tx
            .as_ref()
            .ok_or_else(|| DocError::UnsupportedOperation("transaction already finished".into()))
    }

    /// The async transaction underneath, for use with [`block_on`](Self::block_on).
    pub fn transaction(&self) -> DocResult<&DocTransaction> {
        self.tx()
    }

    /// Drive any future on this transaction's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn query<T: Document>(&self) -> Query<T> {
        match &self.tx {
            Some(tx) => tx.query::<T>(),
            None => Query::new(),
        }
    }

    pub fn to_list<T: Document>(&self, query: &Query<T>) -> DocResult<Vec<T>> {
        let tx = self.tx()?;
        self.block_on(query.to_list(tx))
    }

    pub fn to_list_as<T: Document, R: FromRow>(&self, query: &Query<T>) -> DocResult<Vec<R>> {
        let tx = self.tx()?;
        self.block_on(query.to_list_as(tx))
    }

    pub fn to_list_page<T: Document>(
        &self,
        query: &Query<T>,
        skip: u64,
        take: u64,
    ) -> DocResult<Vec<T>> {
        let tx = self.tx()?;
        self.block_on(query.to_list_page(tx, skip, take))
    }

    pub fn to_list_with_count<T: Document>(
        &self,
        query: &Query<T>,
        skip: u64,
        take: u64,
    ) -> DocResult<(Vec<T>, u64)> {
        let tx = self.tx()?;
        self.block_on(query.to_list_with_count(tx, skip, take))
    }

    pub fn first<T: Document>(&self, query: &Query<T>) -> DocResult<T> {
        let tx = self.tx()?;
        self.block_on(query.first(tx))
    }

    pub fn first_or_default<T: Document>(&self, query: &Query<T>) -> DocResult<Option<T>> {
        let tx = self.tx()?;
        self.block_on(query.first_or_default(tx))
    }

    pub fn count<T: Document>(&self, query: &Query<T>) -> DocResult<u64> {
        let tx = self.tx()?;
        self.block_on(query.count(tx))
    }

    pub fn any<T: Document>(&self, query: &Query<T>) -> DocResult<bool> {
        let tx = self.tx()?;
        self.block_on(query.any(tx))
    }

    pub fn delete_where<T: Document>(&self, query: &Query<T>) -> DocResult<u64> {
        let tx = self.tx()?;
        self.block_on(query.delete(tx))
    }

    pub fn insert<T: Document>(&self, document: &mut T) -> DocResult<i64> {
        let tx = self.tx()?;
        self.block_on(tx.insert(document))
    }

    pub fn insert_with_id<T: Document>(&self, document: &mut T, id: i64) -> DocResult<()> {
        let tx = self.tx()?;
        self.block_on(tx.insert_with_id(document, id))
    }

    pub fn update<T: Document>(&self, document: &T) -> DocResult<()> {
        let tx = self.tx()?;
        self.block_on(tx.update(document))
    }

    pub fn delete_by_id<T: Document>(&self, id: i64) -> DocResult<bool> {
        let tx = self.tx()?;
        self.block_on(tx.delete_by_id::<T>(id))
    }

    pub fn load<T: Document>(&self, id: i64) -> DocResult<Option<T>> {
        let tx = self.tx()?;
        self.block_on(tx.load(id))
    }

    pub fn load_required<T: Document>(&self, id: i64) -> DocResult<T> {
        let tx = self.tx()?;
        self.block_on(tx.load_required(id))
    }

    pub fn load_many<T: Document>(&self, ids: &[i64]) -> DocResult<Vec<T>> {
        let tx = self.tx()?;
        self.block_on(tx.load_many(ids))
    }

    pub fn load_many_required<T: Document>(&self, ids: &[i64]) -> DocResult<Vec<T>> {
        let tx = self.tx()?;
        self.block_on(tx.load_many_required(ids))
    }

    pub fn next_id<T: Document>(&self) -> DocResult<i64> {
        let tx = self.tx()?;
        self.block_on(tx.next_id::<T>())
    }

    pub fn commit(mut self) -> DocResult<()> {
        let tx = self.take()?;
        self.runtime.block_on(tx.commit())
    }

    pub fn rollback(mut self) -> DocResult<()> {
        let tx = self.take()?;
        self.runtime.block_on(tx.rollback())
    }

    fn take(&mut self) -> DocResult<DocTransaction> {
        self.tx
            .take()
            .ok_or_else(|| DocError::UnsupportedOperation("transaction already finished".into()))
    }
}

impl Drop for BlockingTransaction {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = self.runtime.block_on(tx.rollback());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_current_thread() {
        let runtime = runtime().unwrap();
        let flavor = runtime.block_on(async { tokio::runtime::Handle::current().runtime_flavor() });
        assert_eq!(flavor, tokio::runtime::RuntimeFlavor::CurrentThread);
    }
}
