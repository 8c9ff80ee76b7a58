use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    driver::{Driver, Request, Statement, TransactionHandle},
    error::{Error, OgmResult},
    model::{NodeId, Properties},
    response::{
        EmptyResponse, Nodes, Records, RecordShape, Response, ResponseRecord, RowDecoder, Scalar,
        StreamingResponse,
    },
    transaction::Transaction,
};

mod context;
pub use context::*;

mod entity;
pub use entity::*;

mod autocommit;
use autocommit::{finish_implicit, AutocommitResponse};

pub type SessionId = u64;

/// A unit of work against the graph.
///
/// A session holds at most one explicit transaction at a time. Without one,
/// each request runs in its own implicit transaction, committed once its
/// result was fully read and rolled back if anything fails before that.
///
/// Sessions are not meant to be shared between tasks; every operation takes
/// `&mut self`.
pub struct Session {
    id: SessionId,
    driver: Arc<dyn Driver>,
    fetch_size: usize,
    transaction: Option<Transaction>,
    context: MappingContext,
    closed: bool,
}

impl Session {
    pub(crate) fn new(id: SessionId, driver: Arc<dyn Driver>, fetch_size: usize) -> Session {
        Session {
            id,
            driver,
            fetch_size,
            transaction: None,
            context: MappingContext::new(),
            closed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Begins an explicit transaction.
    ///
    /// Fails if the session already holds one, even a failed one: failed
    /// transactions must be rolled back first.
    #[instrument(name = "SessionBegin", level = "debug", skip_all, fields(session = self.id))]
    pub async fn begin_transaction(&mut self) -> OgmResult<TransactionHandle> {
        self.ensure_open()?;
        if let Some(tx) = &self.transaction {
            return Err(Error::illegal_state(format!(
                "session {} already has a {} transaction ({})",
                self.id,
                tx.status(),
                tx.handle()
            )));
        }
        let tx = Transaction::begin(Arc::clone(&self.driver), self.id).await?;
        let handle = tx.handle();
        self.transaction = Some(tx);
        Ok(handle)
    }

    /// Commits the explicit transaction.
    ///
    /// If the commit fails, the transaction stays in the session as failed and
    /// must be rolled back.
    pub async fn commit(&mut self) -> OgmResult<()> {
        self.ensure_open()?;
        let tx = self.current_transaction()?;
        tx.commit().await?;
        self.transaction = None;
        Ok(())
    }

    /// Rolls back the explicit transaction and clears the mapping context,
    /// whose snapshots may reflect discarded writes.
    pub async fn rollback(&mut self) -> OgmResult<()> {
        self.ensure_open()?;
        let tx = self.current_transaction()?;
        tx.rollback().await?;
        self.transaction = None;
        self.context.clear();
        Ok(())
    }

    /// The explicit transaction, if any.
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Executes a request, returning a live response over its rows.
    ///
    /// Rows are decoded one at a time as the response is advanced. `Noop`
    /// requests are answered by an [`EmptyResponse`] without reaching the
    /// driver.
    ///
    /// Inside an explicit transaction, a transport failure while reading the
    /// response fails the transaction. Without one, the request's implicit
    /// transaction lives as long as the response: it is committed when the
    /// response is exhausted, and rolled back if reading fails or if the
    /// response is closed or dropped early.
    #[instrument(name = "SessionQuery", level = "debug", skip_all, fields(session = self.id, %request))]
    pub async fn query<D>(
        &mut self,
        request: Request,
        decoder: D,
    ) -> OgmResult<Box<dyn Response<Item = D::Output>>>
    where
        D: RowDecoder + 'static,
    {
        self.ensure_open()?;
        if let Some(tx) = &self.transaction {
            tx.ensure_open()?;
        }
        if request.is_noop() {
            return Ok(Box::new(EmptyResponse::new()));
        }
        let fetch_size = self.fetch_size;

        if let Some(tx) = self.transaction.as_mut() {
            let source = tx.execute(&request).await?;
            let response = StreamingResponse::new(source, decoder, fetch_size)
                .signal_failures(tx.failure_signal());
            return Ok(Box::new(response));
        }

        let mut tx = Transaction::begin_implicit(Arc::clone(&self.driver), self.id).await?;
        match tx.execute(&request).await {
            Ok(source) => {
                let response = StreamingResponse::new(source, decoder, fetch_size)
                    .signal_failures(tx.failure_signal());
                Ok(Box::new(AutocommitResponse::new(response, tx)))
            }
            Err(error) => finish_implicit(tx, Err(error)).await,
        }
    }

    /// Executes a request, returning a live response over its raw records.
    pub async fn query_records(
        &mut self,
        request: Request,
    ) -> OgmResult<Box<dyn Response<Item = ResponseRecord>>> {
        self.query(request, Records).await
    }

    /// Saves an entity, assigning it an id if it was never saved.
    ///
    /// Entities whose properties equal their snapshot in the mapping context
    /// are not sent to the driver.
    #[instrument(name = "SessionSave", level = "debug", skip_all, fields(session = self.id, label = T::label()))]
    pub async fn save<T: Entity>(&mut self, entity: &mut T) -> OgmResult<()> {
        self.ensure_open()?;
        let properties = entity.to_properties();
        let id = entity.id();

        if let Some(id) = id.filter(|id| !self.context.is_dirty(*id, &properties)) {
            debug!(%id, "entity unchanged");
            let mut response = self.query(Request::noop(), Nodes::new()).await?;
            while response.next().await?.is_some() {}
            return Ok(());
        }

        let request = Request::new(Statement::MergeNode {
            id,
            label: T::label().into(),
            properties,
        })
        .describe(format!("save {}", T::label()));
        let node = self
            .collect(request, Nodes::new())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| match id {
                Some(id) => Error::illegal_state(format!("no {} node {id} to update", T::label())),
                None => Error::decoding("no node returned for the created entity"),
            })?;

        entity.set_id(node.id);
        self.context.merge(node);
        Ok(())
    }

    /// Loads the entity with the given id. Returns `None` if there is no node
    /// with that id under the entity label.
    pub async fn load<T: Entity>(&mut self, id: NodeId) -> OgmResult<Option<T>> {
        let request = Request::new(Statement::MatchNode {
            label: T::label().into(),
            id,
        });
        match self.load_nodes::<T>(request).await?.pop() {
            Some(entity) => Ok(Some(entity)),
            None => {
                self.context.evict(id);
                Ok(None)
            }
        }
    }

    /// Loads every entity of the given type, ordered by id.
    pub async fn load_all<T: Entity>(&mut self) -> OgmResult<Vec<T>> {
        self.load_by(Properties::new()).await
    }

    /// Loads the entities whose properties are equal to the ones in `filter`,
    /// ordered by id.
    pub async fn load_by<T: Entity>(&mut self, filter: Properties) -> OgmResult<Vec<T>> {
        let request = Request::new(Statement::MatchNodes {
            label: T::label().into(),
            filter,
        });
        self.load_nodes(request).await
    }

    /// Deletes an entity. Returns whether a node was deleted; entities that
    /// were never saved are ignored.
    pub async fn delete<T: Entity>(&mut self, entity: &T) -> OgmResult<bool> {
        self.ensure_open()?;
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        let request = Request::new(Statement::DeleteNode {
            label: T::label().into(),
            id,
        });
        let deleted = self.count_rows(request).await? > 0;
        self.context.evict(id);
        Ok(deleted)
    }

    /// Counts the entities of the given type.
    pub async fn count<T: Entity>(&mut self) -> OgmResult<u64> {
        let request = Request::new(Statement::CountNodes {
            label: T::label().into(),
        });
        self.count_rows(request).await
    }

    /// Forgets every snapshot in the mapping context.
    pub fn clear(&mut self) {
        self.context.clear();
    }

    /// Forgets the snapshot of a single node.
    pub fn evict(&mut self, id: NodeId) -> bool {
        self.context.evict(id)
    }

    pub fn context(&self) -> &MappingContext {
        &self.context
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the session, rolling back any unfinished transaction. Later
    /// operations fail. Closing twice does nothing.
    #[instrument(name = "SessionClose", level = "debug", skip_all, fields(session = self.id))]
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut tx) = self.transaction.take() {
            if let Err(error) = tx.rollback().await {
                warn!(%error, "failed to roll back on close");
            }
        }
        self.context.clear();
        self.closed = true;
    }

    async fn load_nodes<T: Entity>(&mut self, request: Request) -> OgmResult<Vec<T>> {
        let nodes = self.collect(request, Nodes::new()).await?;
        nodes
            .into_iter()
            .map(|node| T::from_node(self.context.merge(node)))
            .collect()
    }

    async fn count_rows(&mut self, request: Request) -> OgmResult<u64> {
        let mut counts = self.collect(request, Scalar::<i64>::new()).await?;
        let count = counts
            .pop()
            .ok_or_else(|| Error::decoding("expected a count row"))?;
        u64::try_from(count).map_err(|_| Error::decoding(format!("negative count {count}")))
    }

    /// Executes a request and drains its response, within the explicit
    /// transaction or within an implicit one that is only committed once every
    /// row was decoded.
    async fn collect<D: RowDecoder>(
        &mut self,
        request: Request,
        decoder: D,
    ) -> OgmResult<Vec<D::Output>> {
        self.ensure_open()?;
        if let Some(tx) = self.transaction.as_mut() {
            return drain(tx, &request, decoder, self.fetch_size).await;
        }
        let mut tx = Transaction::begin_implicit(Arc::clone(&self.driver), self.id).await?;
        let result = drain(&mut tx, &request, decoder, self.fetch_size).await;
        finish_implicit(tx, result).await
    }

    fn current_transaction(&mut self) -> OgmResult<&mut Transaction> {
        let id = self.id;
        self.transaction
            .as_mut()
            .ok_or_else(|| Error::illegal_state(format!("session {id} has no transaction")))
    }

    fn ensure_open(&self) -> OgmResult<()> {
        if self.closed {
            return Err(Error::illegal_state(format!("session {} is closed", self.id)));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("driver", &self.driver.name())
            .field("transaction", &self.transaction)
            .field("context", &self.context.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Executes a request in the given transaction and decodes every row. A
/// transport failure while streaming marks the transaction as failed.
async fn drain<D: RowDecoder>(
    tx: &mut Transaction,
    request: &Request,
    decoder: D,
    fetch_size: usize,
) -> OgmResult<Vec<D::Output>> {
    let source = tx.execute(request).await?;
    let mut response =
        StreamingResponse::new(source, decoder, fetch_size).signal_failures(tx.failure_signal());
    if let Statement::DeleteNode { .. } | Statement::CountNodes { .. } = request.statement() {
        response.expect(RecordShape::columns(["count"]));
    }

    let mut items = Vec::new();
    while let Some(item) = response.next().await? {
        items.push(item);
    }
    Ok(items)
}
