//! # pgdoc
//!
//! A hybrid column + JSON document store for PostgreSQL.
//!
//! ## Features
//!
//! - **Hybrid rows**: each document is one row; properties marked indexed
//!   live in real columns, everything else in a JSON blob column
//! - **Typed queries**: `Query<T>` builds filters from typed field handles,
//!   raw fragments, joins, unions, aggregates and pagination
//! - **Deterministic SQL**: the same builder state always renders the same
//!   text and parameter names
//! - **Block key allocation**: ids come from per-table blocks reserved in a
//!   `KeyBlocks` table, never from sequences
//! - **Retry with savepoints**: reads and deletes are retried on transient
//!   failures without poisoning the transaction
//!
//! ## Example
//!
//! ```ignore
//! use pgdoc::prelude::*;
//!
//! #[derive(Debug, Serialize, Deserialize, Document)]
//! #[doc_map(table = "People")]
//! struct Person {
//!     #[doc_map(id)]
//!     id: i64,
//!     #[doc_map(indexed)]
//!     first_name: String,
//!     #[doc_map(indexed)]
//!     last_name: String,
//! }
//!
//! let store = DocumentStore::connect(&database_url, StoreConfig::default())?;
//! let tx = store.begin().await?;
//!
//! let mut duck = Person { id: 0, first_name: "Donald".into(), last_name: "Duck".into() };
//! tx.insert(&mut duck).await?;
//!
//! let ducks = tx
//!     .query::<Person>()
//!     .filter(Person::LAST_NAME.eq("Duck"))
//!     .to_list(&tx)
//!     .await?;
//! tx.commit().await?;
//! ```

pub mod ast;
pub mod blocking;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod ident;
pub mod keygen;
mod logging;
pub mod param;
pub mod query;
pub mod related;
pub mod retry;
pub mod row;
pub mod sql;
pub mod store;
pub mod stream;
pub mod transaction;
pub mod translate;
pub mod types;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

pub mod prelude;

pub use ast::{Aggregate, JoinKind, TableHint};
pub use blocking::{BlockingStore, BlockingTransaction};
pub use client::{GenericClient, RowStream, StreamingClient};
pub use config::{CountStrategy, IsolationLevel, StoreConfig, TransactionOptions};
pub use document::{
    Document, DocumentMap, DocumentMapRegistry, DocumentRegistration, IndexedColumn,
    TypeResolver, UniqueConstraint,
};
pub use error::{DocError, DocResult};
pub use keygen::{BlockSource, KEY_BLOCKS_DDL, KeyAllocator};
pub use param::{Parameter, ParamStore, UniqueParameter};
pub use query::{BoundParameters, ParameterList, Query};
pub use related::{RelatedDocumentStore, SavedDocument};
pub use retry::{BackoffPolicy, NoRetry, OperationKind, RetryManager, RetryPolicy};
pub use row::{FromRow, RowExt};
pub use sql::{Dialect, PreparedCommand};
pub use store::{DocumentStore, DocumentStoreBuilder};
pub use stream::DocumentStream;
pub use transaction::{CancelSignal, DocTransaction, Savepoint, StatementTrace, TracedStatement};
pub use translate::{Expr, Field};
pub use types::{SqlType, TypeHandler, TypeHandlerRegistry};
pub use value::Value;

#[cfg(feature = "pool")]
pub use keygen::PgBlockSource;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_tls};

#[cfg(feature = "derive")]
pub use pgdoc_derive::{Document, FromRow};

// Re-exported for `#[derive(Document)]` registrations.
pub use inventory;
pub use serde_json;
