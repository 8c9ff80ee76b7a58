//! An in-process driver, backed by a concurrent node map.
//!
//! It is the reference implementation of the [`Driver`] contract: writes are
//! staged per transaction (readable by the transaction that issued them) and
//! applied atomically on commit. Connections are modeled as permits of a
//! bounded pool.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{debug, info, instrument, trace};

use crate::{
    config::Configuration,
    driver::{Driver, Request, RowSource, Statement, TransactionHandle},
    error::{Error, OgmResult},
    model::{Node, NodeId, Properties, Value},
};

/// A pooled connection. It goes back to the pool once the transaction that
/// acquired it is finished *and* every row source it produced is closed.
type Lease = Arc<OwnedSemaphorePermit>;

struct TxState {
    /// Staged writes. `None` marks a deletion.
    writes: HashMap<NodeId, Option<Node>>,
    lease: Lease,
}

pub struct InMemoryDriver {
    /// Committed nodes.
    store: DashMap<NodeId, Node>,
    /// Open transactions.
    transactions: DashMap<u64, TxState>,
    /// Connection pool.
    pool: Arc<Semaphore>,
    pool_size: usize,
    /// Requests hold it for reading; commits hold it for writing, so that no
    /// request observes a half-applied commit.
    commit_lock: RwLock<()>,
    next_node_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl InMemoryDriver {
    /// Constructs a new driver with a pool of `pool_size` connections.
    pub fn new(pool_size: usize) -> InMemoryDriver {
        let pool_size = pool_size.max(1);
        InMemoryDriver {
            store: DashMap::with_capacity(256),
            transactions: DashMap::new(),
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            commit_lock: RwLock::new(()),
            next_node_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &Configuration) -> InMemoryDriver {
        InMemoryDriver::new(config.connection_pool_size())
    }

    /// Returns the committed version of a node.
    pub fn committed(&self, id: NodeId) -> Option<Node> {
        self.store.get(&id).map(|node| node.clone())
    }

    /// Returns the number of committed nodes.
    pub fn committed_len(&self) -> usize {
        self.store.len()
    }

    /// Returns the number of connections currently available in the pool.
    pub fn available_connections(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of transactions not yet committed or rolled back.
    pub fn open_transactions(&self) -> usize {
        self.transactions.len()
    }

    /// Runs a statement against the state visible to the given transaction.
    fn run(&self, state: &mut TxState, statement: &Statement) -> OgmResult<Rows> {
        let rows = match statement {
            Statement::MergeNode {
                id: None,
                label,
                properties,
            } => {
                let id = NodeId::new(self.next_node_id.fetch_add(1, Ordering::Relaxed));
                let node = Node::new(id, vec![label.clone()], properties.clone());
                state.writes.insert(id, Some(node.clone()));
                Rows::nodes(vec![node])
            }
            Statement::MergeNode {
                id: Some(id),
                label,
                properties,
            } => match self.visible(state, *id, label) {
                Some(mut node) => {
                    node.properties = properties.clone();
                    state.writes.insert(*id, Some(node.clone()));
                    Rows::nodes(vec![node])
                }
                None => Rows::nodes(Vec::new()),
            },
            Statement::MatchNode { label, id } => {
                Rows::nodes(self.visible(state, *id, label).into_iter().collect())
            }
            Statement::MatchNodes { label, filter } => {
                let nodes = self
                    .visible_with_label(state, label)
                    .into_values()
                    .filter(|node| matches_filter(node, filter))
                    .collect();
                Rows::nodes(nodes)
            }
            Statement::DeleteNode { label, id } => {
                let deleted = self.visible(state, *id, label).is_some();
                if deleted {
                    state.writes.insert(*id, None);
                }
                Rows::count(i64::from(deleted))
            }
            Statement::CountNodes { label } => {
                let count = self.visible_with_label(state, label).len();
                Rows::count(count as i64)
            }
            Statement::Rows { columns, rows } => {
                if let Some((i, row)) = rows
                    .iter()
                    .enumerate()
                    .find(|(_, row)| row.len() != columns.len())
                {
                    return Err(Error::illegal_state(format!(
                        "rejected statement: row {i} has {} values, but {} columns were declared",
                        row.len(),
                        columns.len()
                    )));
                }
                Rows {
                    columns: columns.clone(),
                    rows: rows.iter().cloned().collect(),
                }
            }
            Statement::Noop => Rows {
                columns: Vec::new(),
                rows: VecDeque::new(),
            },
        };
        Ok(rows)
    }

    /// Returns the node with the given id and label, as seen by the
    /// transaction.
    fn visible(&self, state: &TxState, id: NodeId, label: &str) -> Option<Node> {
        let node = match state.writes.get(&id) {
            Some(write) => write.clone(),
            None => self.committed(id),
        };
        node.filter(|node| node.has_label(label))
    }

    /// Returns every node with the given label, as seen by the transaction.
    fn visible_with_label(&self, state: &TxState, label: &str) -> BTreeMap<NodeId, Node> {
        let mut nodes: BTreeMap<_, _> = self
            .store
            .iter()
            .filter(|entry| entry.value().has_label(label))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        for (id, write) in &state.writes {
            match write {
                Some(node) if node.has_label(label) => {
                    nodes.insert(*id, node.clone());
                }
                _ => {
                    nodes.remove(id);
                }
            }
        }
        nodes
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        InMemoryDriver::new(Configuration::DEFAULT_POOL_SIZE)
    }
}

fn matches_filter(node: &Node, filter: &Properties) -> bool {
    filter
        .iter()
        .all(|(name, value)| node.properties.get(name) == Some(value))
}

fn unknown_tx(tx: TransactionHandle) -> Error {
    Error::transport(format!("unknown or finished transaction {tx}"))
}

#[async_trait]
impl Driver for InMemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    #[instrument(name = "MemoryOpenTransaction", level = "debug", skip_all)]
    async fn open_transaction(&self) -> OgmResult<TransactionHandle> {
        let permit = Arc::clone(&self.pool)
            .acquire_owned()
            .await
            .map_err(|_| Error::transport("driver is closed"))?;
        let tx = TransactionHandle::new(self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        self.transactions.insert(
            tx.id(),
            TxState {
                writes: HashMap::new(),
                lease: Arc::new(permit),
            },
        );
        debug!(%tx, available = self.pool.available_permits(), "opened transaction");
        Ok(tx)
    }

    #[instrument(name = "MemoryExecute", level = "debug", skip_all, fields(%tx, %request))]
    async fn execute(
        &self,
        request: &Request,
        tx: TransactionHandle,
    ) -> OgmResult<Box<dyn RowSource>> {
        let _read = self.commit_lock.read().await;
        let mut state = self.transactions.get_mut(&tx.id()).ok_or_else(|| unknown_tx(tx))?;
        let Rows { columns, rows } = self.run(&mut state, request.statement())?;
        trace!(rows = rows.len(), write = request.statement().is_write(), "statement executed");
        Ok(Box::new(MemoryRowSource {
            columns,
            rows,
            lease: Some(Arc::clone(&state.lease)),
        }))
    }

    #[instrument(name = "MemoryCommit", level = "debug", skip_all, fields(%tx))]
    async fn commit(&self, tx: TransactionHandle) -> OgmResult<()> {
        let _write = self.commit_lock.write().await;
        let (_, state) = self.transactions.remove(&tx.id()).ok_or_else(|| unknown_tx(tx))?;
        let write_count = state.writes.len();
        for (id, write) in state.writes {
            match write {
                Some(node) => {
                    self.store.insert(id, node);
                }
                None => {
                    self.store.remove(&id);
                }
            }
        }
        debug!(write_count, "committed transaction");
        Ok(())
    }

    #[instrument(name = "MemoryRollback", level = "debug", skip_all, fields(%tx))]
    async fn rollback(&self, tx: TransactionHandle) -> OgmResult<()> {
        let (_, state) = self.transactions.remove(&tx.id()).ok_or_else(|| unknown_tx(tx))?;
        debug!(discarded = state.writes.len(), "rolled back transaction");
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
        let abandoned = self.transactions.len();
        self.transactions.clear();
        info!(abandoned, "closed in-memory driver");
    }
}

/// Result rows of a statement, before being handed out as a row source.
struct Rows {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
}

impl Rows {
    fn nodes(nodes: Vec<Node>) -> Rows {
        Rows {
            columns: vec!["n".into()],
            rows: nodes.into_iter().map(|node| vec![Value::Node(node)]).collect(),
        }
    }

    fn count(count: i64) -> Rows {
        Rows {
            columns: vec!["count".into()],
            rows: VecDeque::from([vec![Value::Int(count)]]),
        }
    }
}

/// Row source over the result buffered on the driver side.
struct MemoryRowSource {
    columns: Vec<String>,
    rows: VecDeque<Vec<Value>>,
    lease: Option<Lease>,
}

#[async_trait]
impl RowSource for MemoryRowSource {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch(&mut self, max_rows: usize) -> OgmResult<Vec<Vec<Value>>> {
        if self.lease.is_none() {
            return Err(Error::illegal_state("row source is closed"));
        }
        let n = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..n).collect())
    }

    fn close(&mut self) {
        self.rows.clear();
        self.lease = None;
    }
}
