//! Hook for bookkeeping that follows saved documents.

use crate::error::DocResult;
use crate::transaction::DocTransaction;
use async_trait::async_trait;

/// A document that was just written, as seen by a [`RelatedDocumentStore`].
#[derive(Debug, Clone, Copy)]
pub struct SavedDocument<'a> {
    pub table: &'a str,
    pub id: i64,
    /// Full serialized document, id included.
    pub document: &'a serde_json::Value,
}

/// Receives every successful insert and update made through a
/// [`DocTransaction`], inside the same transaction.
///
/// Not called for failed writes or for bulk [`Query::delete`](crate::Query::delete).
#[async_trait]
pub trait RelatedDocumentStore: Send + Sync {
    async fn on_saved(&self, tx: &DocTransaction, saved: SavedDocument<'_>) -> DocResult<()>;
}
