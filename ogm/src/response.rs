use async_trait::async_trait;
use futures_util::stream::{self, Stream};

use crate::error::OgmResult;

mod record;
pub use record::*;

mod decode;
pub use decode::*;

mod empty;
pub use empty::*;

mod cursor;
pub use cursor::*;

/// A lazily-consumed cursor over the decoded rows of a query result.
///
/// Results may be arbitrarily large, so implementations must decode exactly
/// one row per [`Response::next`] call; rows may be read from the underlying
/// transport in buffered chunks, but never eagerly materialized as a whole.
///
/// Every operation is defined after exhaustion and after [`Response::close`]:
/// `next` keeps returning `None`, and `close` may be called any number of
/// times.
#[async_trait]
pub trait Response: Send {
    type Item: Send;

    /// Advances the cursor by exactly one row. Returns `None` once no rows
    /// remain, or if the response was closed.
    async fn next(&mut self) -> OgmResult<Option<Self::Item>>;

    /// Asserts the shape of the next record. If the next record doesn't match,
    /// `next` fails with a decoding error instead of yielding it.
    fn expect(&mut self, shape: RecordShape);

    /// The column names of the result. Empty until the first row is available,
    /// and for results with no rows at all.
    fn columns(&self) -> &[String];

    /// The 0-based index of the most recently returned row, or `-1` if no row
    /// was returned yet.
    fn row_id(&self) -> i64;

    /// Releases the underlying streaming resources. Idempotent.
    fn close(&mut self);
}

#[async_trait]
impl<R: Response + ?Sized> Response for Box<R> {
    type Item = R::Item;

    async fn next(&mut self) -> OgmResult<Option<Self::Item>> {
        (**self).next().await
    }

    fn expect(&mut self, shape: RecordShape) {
        (**self).expect(shape)
    }

    fn columns(&self) -> &[String] {
        (**self).columns()
    }

    fn row_id(&self) -> i64 {
        (**self).row_id()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Consuming helpers for any [`Response`].
#[async_trait]
pub trait ResponseExt: Response {
    /// Consumes all remaining rows, returning how many were read.
    async fn drain(&mut self) -> OgmResult<usize> {
        let mut count = 0;
        while self.next().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Collects all remaining rows. Only use this when the result is known to
    /// be small.
    async fn collect_all(&mut self) -> OgmResult<Vec<Self::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }
}

impl<R: Response + ?Sized> ResponseExt for R {}

/// Adapts a response into a [`Stream`]. The stream ends after the last row or
/// after the first error, in which case the response is closed.
pub fn into_stream<R>(response: R) -> impl Stream<Item = OgmResult<R::Item>>
where
    R: Response,
{
    stream::unfold(Some(response), |state| async move {
        let mut response = state?;
        match response.next().await {
            Ok(Some(item)) => Some((Ok(item), Some(response))),
            Ok(None) => None,
            Err(error) => {
                response.close();
                Some((Err(error), None))
            }
        }
    })
}
