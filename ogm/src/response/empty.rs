use std::{fmt, marker::PhantomData};

use async_trait::async_trait;

use crate::{
    error::OgmResult,
    response::{RecordShape, Response, ResponseRecord},
};

/// The response of an operation that performed no round trip to the store.
///
/// It never yields rows, has no columns, stays at row `-1`, and ignores
/// `expect` and `close`.
pub struct EmptyResponse<T = ResponseRecord> {
    _item: PhantomData<fn() -> T>,
}

impl<T> EmptyResponse<T> {
    pub fn new() -> EmptyResponse<T> {
        EmptyResponse { _item: PhantomData }
    }
}

impl<T> Default for EmptyResponse<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EmptyResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EmptyResponse")
    }
}

#[async_trait]
impl<T: Send> Response for EmptyResponse<T> {
    type Item = T;

    async fn next(&mut self) -> OgmResult<Option<T>> {
        Ok(None)
    }

    fn expect(&mut self, _shape: RecordShape) {}

    fn columns(&self) -> &[String] {
        &[]
    }

    fn row_id(&self) -> i64 {
        -1
    }

    fn close(&mut self) {}
}
