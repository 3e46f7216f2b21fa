//! Narrow connection contract used by the execution layer.
//!
//! A [`DocTransaction`](crate::transaction::DocTransaction) only needs to run
//! text statements, stream rows and cancel a running statement. These traits
//! describe exactly that, over a direct `tokio_postgres::Client` or a pooled
//! `deadpool_postgres::Client`.

use crate::error::{DocError, DocResult};
use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Statement execution over one physical connection.
pub trait GenericClient: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DocResult<Vec<Row>>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DocResult<u64>> + Send;

    /// Run parameterless statements (transaction control, savepoints).
    fn batch_execute(&self, sql: &str) -> impl std::future::Future<Output = DocResult<()>> + Send;

    /// Token for cancelling the statement currently running on this connection.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }

    /// Whether the underlying connection has been closed.
    fn is_closed(&self) -> bool {
        false
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(DocError::from)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(DocError::from)
    }

    async fn batch_execute(&self, sql: &str) -> DocResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(DocError::from)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }

    fn is_closed(&self) -> bool {
        tokio_postgres::Client::is_closed(self)
    }
}

/// A stream of database rows.
///
/// Type-erased wrapper so every client returns the same streaming type.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = DocResult<Row>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = DocResult<Row>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").finish_non_exhaustive()
    }
}

impl Stream for RowStream {
    type Item = DocResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Streaming query support.
///
/// Separate from [`GenericClient`] so only clients that can stream rows
/// incrementally (via `query_raw`) need to implement it.
pub trait StreamingClient: GenericClient {
    /// Execute a query and return a `RowStream` for incremental consumption.
    fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DocResult<RowStream>> + Send;
}

struct MapDbRowStream<S> {
    inner: Pin<Box<S>>,
}

impl<S> MapDbRowStream<S> {
    fn new(stream: S) -> Self {
        Self {
            inner: Box::pin(stream),
        }
    }
}

impl<S> Stream for MapDbRowStream<S>
where
    S: Stream<Item = Result<Row, tokio_postgres::Error>> + Send + 'static,
{
    type Item = DocResult<Row>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(Ok(row))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(DocError::from(e)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl StreamingClient for tokio_postgres::Client {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DocResult<RowStream> {
        let stream = tokio_postgres::Client::query_raw(self, sql, params.iter().copied())
            .await
            .map_err(DocError::from)?;
        Ok(RowStream::new(MapDbRowStream::new(stream)))
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<Vec<Row>> {
        GenericClient::query(&***self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DocResult<u64> {
        GenericClient::execute(&***self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> DocResult<()> {
        GenericClient::batch_execute(&***self, sql).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        GenericClient::cancel_token(&***self)
    }

    fn is_closed(&self) -> bool {
        GenericClient::is_closed(&***self)
    }
}

#[cfg(feature = "pool")]
impl StreamingClient for deadpool_postgres::Client {
    async fn query_stream(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DocResult<RowStream> {
        StreamingClient::query_stream(&***self, sql, params).await
    }
}
