use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    error::OgmResult,
    response::{RecordShape, Response},
    transaction::Transaction,
};

/// A response owning the implicit transaction its request runs in.
///
/// The transaction is committed once every row was read, and rolled back as
/// soon as reading a row fails. Closing or dropping the response before the
/// end rolls it back too, so writes are only kept if the whole result was
/// consumed.
pub(crate) struct AutocommitResponse<R> {
    inner: R,
    tx: Option<Transaction>,
}

impl<R> AutocommitResponse<R> {
    pub(crate) fn new(inner: R, tx: Transaction) -> AutocommitResponse<R> {
        AutocommitResponse {
            inner,
            tx: Some(tx),
        }
    }
}

#[async_trait]
impl<R: Response> Response for AutocommitResponse<R> {
    type Item = R::Item;

    async fn next(&mut self) -> OgmResult<Option<R::Item>> {
        let result = self.inner.next().await;
        let Some(tx) = self.tx.take() else {
            return result;
        };
        match result {
            Ok(Some(item)) => {
                self.tx = Some(tx);
                Ok(Some(item))
            }
            Ok(None) => finish_implicit(tx, Ok(None)).await,
            Err(error) => {
                self.inner.close();
                finish_implicit(tx, Err(error)).await
            }
        }
    }

    fn expect(&mut self, shape: RecordShape) {
        self.inner.expect(shape);
    }

    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    fn row_id(&self) -> i64 {
        self.inner.row_id()
    }

    fn close(&mut self) {
        self.inner.close();
        if let Some(tx) = self.tx.take() {
            debug!(tx = %tx.handle(), "response closed before the end");
            // Dropping the unfinished transaction schedules its rollback.
            drop(tx);
        }
    }
}

/// Ends an implicit transaction: commits if `result` is a success, rolls back
/// otherwise (or if the commit fails). The first error wins.
pub(super) async fn finish_implicit<T>(
    mut tx: Transaction,
    result: OgmResult<T>,
) -> OgmResult<T> {
    let error = match result {
        Ok(value) => match tx.commit().await {
            Ok(()) => return Ok(value),
            Err(error) => error,
        },
        Err(error) => error,
    };
    if let Err(rollback_error) = tx.rollback().await {
        warn!(%rollback_error, "failed to roll back implicit transaction");
    }
    Err(error)
}
