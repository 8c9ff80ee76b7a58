use std::fmt;

use async_trait::async_trait;

use crate::{error::OgmResult, model::Value};

pub mod memory;

mod request;
pub use request::*;

/// A driver-assigned transaction identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransactionHandle(u64);

impl TransactionHandle {
    pub const fn new(id: u64) -> TransactionHandle {
        TransactionHandle(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// The transport side of a result: raw rows, pulled in chunks.
///
/// The column names must be known once the source is handed out by
/// [`Driver::execute`].
#[async_trait]
pub trait RowSource: Send {
    fn columns(&self) -> &[String];

    /// Fetches at most `max_rows` rows. An empty chunk means the result is
    /// exhausted.
    async fn fetch(&mut self, max_rows: usize) -> OgmResult<Vec<Vec<Value>>>;

    /// Releases any transport resource held by this source. Idempotent.
    fn close(&mut self);
}

/// Transport-level access to a graph store.
///
/// The session core depends only on this contract; whether rows travel over
/// HTTP, a binary protocol or not at all is up to the implementation. All
/// requests run inside a transaction; drivers never retry on their own behalf
/// unless it is part of their connection management.
#[async_trait]
pub trait Driver: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Opens a transaction, borrowing a connection from the driver's pool until
    /// the transaction finishes.
    async fn open_transaction(&self) -> OgmResult<TransactionHandle>;

    /// Executes the request inside the given transaction.
    async fn execute(
        &self,
        request: &Request,
        tx: TransactionHandle,
    ) -> OgmResult<Box<dyn RowSource>>;

    /// Atomically applies every operation issued in the transaction.
    async fn commit(&self, tx: TransactionHandle) -> OgmResult<()>;

    /// Discards every operation issued in the transaction.
    async fn rollback(&self, tx: TransactionHandle) -> OgmResult<()>;

    /// Shuts the driver down. Later calls to `open_transaction` fail.
    async fn close(&self);
}
