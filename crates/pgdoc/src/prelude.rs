//! Convenient imports for typical `pgdoc` usage.
//!
//! ```ignore
//! use pgdoc::prelude::*;
//! ```

pub use crate::{
    Aggregate, DocError, DocResult, Document, DocumentStore, DocTransaction, Field, FromRow,
    JoinKind, OperationKind, Query, RowExt, StoreConfig, TableHint, TransactionOptions,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};

pub use serde::{Deserialize, Serialize};
