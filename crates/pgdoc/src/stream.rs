//! Lazy, single-pass document streams.

use crate::client::RowStream;
use crate::document::{Document, DocumentMap};
use crate::error::DocResult;
use crate::row::read_document;
use crate::types::TypeHandlerRegistry;
use futures_core::Stream;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Documents read one row at a time.
///
/// Borrows the transaction it was opened on, so it cannot outlive it.
/// Dropping the stream early stops reading; the remaining rows are discarded
/// by the driver.
///
/// ```ignore
/// use futures_util::TryStreamExt;
///
/// let mut people = tx.query::<Person>().stream(&tx).await?;
/// while let Some(person) = people.try_next().await? {
///     println!("{}", person.first_name);
/// }
/// ```
#[must_use]
pub struct DocumentStream<'t, T> {
    inner: RowStream,
    map: Arc<DocumentMap>,
    handlers: TypeHandlerRegistry,
    _marker: PhantomData<(&'t (), fn() -> T)>,
}

impl<'t, T> DocumentStream<'t, T> {
    pub(crate) fn new(inner: RowStream, map: Arc<DocumentMap>, handlers: TypeHandlerRegistry) -> Self {
        Self {
            inner,
            map,
            handlers,
            _marker: PhantomData,
        }
    }
}

impl<T: Document> Stream for DocumentStream<'_, T> {
    type Item = DocResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(row))) => {
                Poll::Ready(Some(read_document(&self.map, &self.handlers, &row)))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}
