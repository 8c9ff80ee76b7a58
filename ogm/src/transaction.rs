use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::runtime::Handle;
use tracing::{debug, instrument, warn};

use crate::{
    driver::{Driver, Request, RowSource, TransactionHandle},
    error::{Error, OgmResult},
    session::SessionId,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Open,
    Committed,
    RolledBack,
    /// The driver reported a failure. Only a rollback is accepted from here.
    Failed,
}

impl TransactionStatus {
    /// Checks whether the status is terminal.
    pub fn is_finished(self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::RolledBack)
    }

    /// Validates the transition to `to`, returning the new status.
    pub fn transition(self, to: TransactionStatus) -> OgmResult<TransactionStatus> {
        use TransactionStatus::*;
        match (self, to) {
            (Open, Committed | RolledBack | Failed) | (Failed, RolledBack) => Ok(to),
            (from, to) => Err(Error::illegal_state(format!(
                "can't move a {from} transaction to {to}"
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionStatus::Open => "open",
            TransactionStatus::Committed => "committed",
            TransactionStatus::RolledBack => "rolled back",
            TransactionStatus::Failed => "failed",
        })
    }
}

/// Raised by the responses of a transaction when the driver fails while
/// they stream rows, and picked up by the transaction on its next operation.
#[derive(Clone, Debug, Default)]
pub(crate) struct FailureSignal(Arc<AtomicBool>);

impl FailureSignal {
    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A unit of work against a [`Driver`].
///
/// If dropped while still open (or failed), a rollback is scheduled on the
/// current runtime so that the driver connection goes back to its pool.
pub struct Transaction {
    handle: TransactionHandle,
    status: TransactionStatus,
    session_id: SessionId,
    driver: Arc<dyn Driver>,
    implicit: bool,
    failure: FailureSignal,
}

impl Transaction {
    /// Opens an explicit transaction on behalf of the given session.
    pub async fn begin(driver: Arc<dyn Driver>, session_id: SessionId) -> OgmResult<Transaction> {
        Transaction::open(driver, session_id, false).await
    }

    /// Opens a single-request transaction, used in autocommit mode.
    pub(crate) async fn begin_implicit(
        driver: Arc<dyn Driver>,
        session_id: SessionId,
    ) -> OgmResult<Transaction> {
        Transaction::open(driver, session_id, true).await
    }

    async fn open(
        driver: Arc<dyn Driver>,
        session_id: SessionId,
        implicit: bool,
    ) -> OgmResult<Transaction> {
        let handle = driver.open_transaction().await?;
        debug!(tx = %handle, session_id, implicit, "began transaction");
        Ok(Transaction {
            handle,
            status: TransactionStatus::Open,
            session_id,
            driver,
            implicit,
            failure: FailureSignal::default(),
        })
    }

    pub fn handle(&self) -> TransactionHandle {
        self.handle
    }

    /// The current status. A transport failure seen by one of this
    /// transaction's responses shows up here as [`TransactionStatus::Failed`].
    pub fn status(&self) -> TransactionStatus {
        match self.status {
            TransactionStatus::Open if self.failure.is_raised() => TransactionStatus::Failed,
            status => status,
        }
    }

    /// The id of the session that owns this transaction.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// Asks the driver to apply every request issued in this transaction.
    ///
    /// Only valid while open. If the driver fails, the transaction is marked
    /// as failed and must be rolled back.
    #[instrument(name = "TransactionCommit", level = "debug", skip_all, fields(tx = %self.handle))]
    pub async fn commit(&mut self) -> OgmResult<()> {
        self.sync_failure();
        let next = self.status.transition(TransactionStatus::Committed)?;
        match self.driver.commit(self.handle).await {
            Ok(()) => {
                self.status = next;
                Ok(())
            }
            Err(error) => {
                warn!(%error, "commit failed");
                self.status = TransactionStatus::Failed;
                Err(error)
            }
        }
    }

    /// Asks the driver to discard every request issued in this transaction.
    ///
    /// Valid while open or failed. Rolling back a failed transaction always
    /// succeeds, as the driver may have already discarded it.
    #[instrument(name = "TransactionRollback", level = "debug", skip_all, fields(tx = %self.handle))]
    pub async fn rollback(&mut self) -> OgmResult<()> {
        self.sync_failure();
        let next = self.status.transition(TransactionStatus::RolledBack)?;
        match self.driver.rollback(self.handle).await {
            Ok(()) => {}
            Err(error) if self.status == TransactionStatus::Failed => {
                debug!(%error, "driver rejected rollback of a failed transaction");
            }
            Err(error) => {
                warn!(%error, "rollback failed");
                self.status = TransactionStatus::Failed;
                return Err(error);
            }
        }
        self.status = next;
        Ok(())
    }

    /// Executes a request inside this transaction. A transport failure marks
    /// the transaction as failed.
    pub(crate) async fn execute(&mut self, request: &Request) -> OgmResult<Box<dyn RowSource>> {
        self.sync_failure();
        self.ensure_open()?;
        let result = self.driver.execute(request, self.handle).await;
        if let Err(error) = &result {
            if error.is_transport() {
                self.mark_failed();
            }
        }
        result
    }

    /// Fails unless the transaction is open.
    pub(crate) fn ensure_open(&self) -> OgmResult<()> {
        match self.status() {
            TransactionStatus::Open => Ok(()),
            status => Err(Error::illegal_state(format!(
                "transaction {} is {status}",
                self.handle
            ))),
        }
    }

    /// The signal shared with the responses streaming this transaction's rows.
    pub(crate) fn failure_signal(&self) -> FailureSignal {
        self.failure.clone()
    }

    pub(crate) fn mark_failed(&mut self) {
        self.failure.raise();
        self.sync_failure();
    }

    fn sync_failure(&mut self) {
        if self.status == TransactionStatus::Open && self.failure.is_raised() {
            warn!(tx = %self.handle, "transaction failed");
            self.status = TransactionStatus::Failed;
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("handle", &self.handle)
            .field("status", &self.status)
            .field("session_id", &self.session_id)
            .field("driver", &self.driver.name())
            .field("implicit", &self.implicit)
            .field("failed", &self.failure.is_raised())
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.status.is_finished() {
            return;
        }
        let tx = self.handle;
        let Ok(runtime) = Handle::try_current() else {
            warn!(%tx, "unfinished transaction dropped outside of a runtime");
            return;
        };
        if self.implicit {
            debug!(%tx, status = %self.status, "implicit transaction abandoned, rolling back");
        } else {
            warn!(%tx, status = %self.status, "unfinished transaction dropped, rolling back");
        }
        let driver = Arc::clone(&self.driver);
        runtime.spawn(async move {
            if let Err(error) = driver.rollback(tx).await {
                debug!(%tx, %error, "background rollback failed");
            }
        });
    }
}
