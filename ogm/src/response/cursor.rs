use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument, trace};

use crate::{
    driver::RowSource,
    error::OgmResult,
    model::Value,
    response::{RecordShape, Response, ResponseRecord, RowDecoder},
    transaction::FailureSignal,
};

/// A response streaming rows out of a driver [`RowSource`].
///
/// Raw rows are pulled in chunks of at most `fetch_size` rows, but each call
/// to `next` decodes a single one. The row source, and with it the driver
/// connection lease, is released as soon as the stream is exhausted, on
/// `close`, on a transport failure, or on drop, whichever comes first.
///
/// Responses created by a session inside a transaction report transport
/// failures to it, so that it can only be rolled back afterwards.
pub struct StreamingResponse<D> {
    source: Option<Box<dyn RowSource>>,
    decoder: D,
    columns: Arc<[String]>,
    buffer: VecDeque<Vec<Value>>,
    /// Set once the first non-empty chunk arrives. Columns are only reported
    /// from then on, so a result with no rows looks like an empty response.
    has_data: bool,
    fetch_size: usize,
    row_id: i64,
    expected: Option<RecordShape>,
    failure: Option<FailureSignal>,
}

impl<D> StreamingResponse<D> {
    pub fn new(source: Box<dyn RowSource>, decoder: D, fetch_size: usize) -> StreamingResponse<D> {
        let columns = source.columns().iter().cloned().collect();
        StreamingResponse {
            source: Some(source),
            decoder,
            columns,
            buffer: VecDeque::new(),
            has_data: false,
            fetch_size: fetch_size.max(1),
            row_id: -1,
            expected: None,
            failure: None,
        }
    }

    /// Raises `signal` if fetching rows fails with a transport error.
    pub(crate) fn signal_failures(mut self, signal: FailureSignal) -> StreamingResponse<D> {
        self.failure = Some(signal);
        self
    }

    /// Checks whether the row source is still held.
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    /// Returns the next raw row, fetching a new chunk if the buffer is empty.
    async fn pull(&mut self) -> OgmResult<Option<Vec<Value>>> {
        if let Some(row) = self.buffer.pop_front() {
            return Ok(Some(row));
        }
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        trace!(fetch_size = self.fetch_size, "fetching next chunk");
        let chunk = match source.fetch(self.fetch_size).await {
            Ok(chunk) => chunk,
            Err(error) => {
                if let Some(signal) = self.failure.as_ref().filter(|_| error.is_transport()) {
                    signal.raise();
                }
                self.release();
                return Err(error);
            }
        };
        if chunk.is_empty() {
            debug!(rows = self.row_id + 1, "response exhausted");
            self.release();
            return Ok(None);
        }
        self.has_data = true;
        self.buffer.extend(chunk);
        Ok(self.buffer.pop_front())
    }

    fn release(&mut self) {
        self.buffer.clear();
        if let Some(mut source) = self.source.take() {
            source.close();
            trace!("released row source");
        }
    }
}

#[async_trait]
impl<D: RowDecoder> Response for StreamingResponse<D> {
    type Item = D::Output;

    #[instrument(name = "ResponseNext", level = "trace", skip_all)]
    async fn next(&mut self) -> OgmResult<Option<D::Output>> {
        let Some(row) = self.pull().await? else {
            return Ok(None);
        };
        let record = ResponseRecord::new(Arc::clone(&self.columns), row)?;
        if let Some(shape) = self.expected.take() {
            shape.check(&record)?;
        }
        let item = self.decoder.decode(record)?;
        self.row_id += 1;
        Ok(Some(item))
    }

    fn expect(&mut self, shape: RecordShape) {
        self.expected = Some(shape);
    }

    fn columns(&self) -> &[String] {
        if self.has_data {
            &self.columns
        } else {
            &[]
        }
    }

    fn row_id(&self) -> i64 {
        self.row_id
    }

    fn close(&mut self) {
        self.release();
    }
}

impl<D> Drop for StreamingResponse<D> {
    fn drop(&mut self) {
        self.release();
    }
}
