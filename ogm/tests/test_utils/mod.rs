use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use ogm::{
    config::Configuration,
    driver::{memory::InMemoryDriver, Driver, Request, RowSource, Statement, TransactionHandle},
    error::{Error, OgmResult},
    model::{Node, NodeId, Properties, Value},
    Entity, SessionFactory,
};

/// Sets up tracing subscriber.
#[allow(dead_code)]
pub fn setup_tracing(level: Option<&str>) {
    use tracing_subscriber::{
        fmt::{format::FmtSpan, layer},
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let filter_layer = level
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or("warn".into()));
    let fmt_layer = layer().with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Several tests in the same binary may try to install it.
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Option<NodeId>,
    pub name: String,
    pub age: i64,
}

impl Person {
    #[allow(dead_code)]
    pub fn new(name: &str, age: i64) -> Person {
        Person {
            id: None,
            name: name.into(),
            age,
        }
    }
}

/// A request creating a `Person` node, answered with the created node.
#[allow(dead_code)]
pub fn merge_person(name: &str, age: i64) -> Request {
    Request::new(Statement::MergeNode {
        id: None,
        label: Person::label().into(),
        properties: Person::new(name, age).to_properties(),
    })
}

impl Entity for Person {
    fn label() -> &'static str {
        "Person"
    }

    fn id(&self) -> Option<NodeId> {
        self.id
    }

    fn set_id(&mut self, id: NodeId) {
        self.id = Some(id);
    }

    fn to_properties(&self) -> Properties {
        Properties::from([
            ("name".into(), Value::from(self.name.as_str())),
            ("age".into(), Value::from(self.age)),
        ])
    }

    fn from_node(node: &Node) -> OgmResult<Person> {
        Ok(Person {
            id: Some(node.id),
            name: node.property("name")?,
            age: node.property("age")?,
        })
    }
}

/// Wraps an [`InMemoryDriver`], failing the operations it is told to.
#[derive(Default)]
pub struct FaultyDriver {
    pub inner: InMemoryDriver,
    pub fail_execute: AtomicBool,
    pub fail_commit: AtomicBool,
    pub fail_fetch: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl FaultyDriver {
    pub fn new(pool_size: usize) -> FaultyDriver {
        FaultyDriver {
            inner: InMemoryDriver::new(pool_size),
            ..FaultyDriver::default()
        }
    }

    pub fn fail_execute(&self, fail: bool) {
        self.fail_execute.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commit(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Driver for FaultyDriver {
    fn name(&self) -> &'static str {
        "faulty"
    }

    async fn open_transaction(&self) -> OgmResult<TransactionHandle> {
        self.inner.open_transaction().await
    }

    async fn execute(
        &self,
        request: &Request,
        tx: TransactionHandle,
    ) -> OgmResult<Box<dyn RowSource>> {
        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".into()));
        }
        let inner = self.inner.execute(request, tx).await?;
        Ok(Box::new(FaultySource {
            inner,
            fail: Arc::clone(&self.fail_fetch),
        }))
    }

    async fn commit(&self, tx: TransactionHandle) -> OgmResult<()> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection lost during commit".into()));
        }
        self.inner.commit(tx).await
    }

    async fn rollback(&self, tx: TransactionHandle) -> OgmResult<()> {
        self.inner.rollback(tx).await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

struct FaultySource {
    inner: Box<dyn RowSource>,
    fail: Arc<AtomicBool>,
}

#[async_trait]
impl RowSource for FaultySource {
    fn columns(&self) -> &[String] {
        self.inner.columns()
    }

    async fn fetch(&mut self, max_rows: usize) -> OgmResult<Vec<Vec<Value>>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Transport("stream interrupted".into()));
        }
        self.inner.fetch(max_rows).await
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Builds a factory over the given driver, with the given fetch size.
#[allow(dead_code)]
pub fn factory_with(driver: Arc<dyn Driver>, fetch_size: usize) -> SessionFactory {
    let config = Configuration::builder()
        .uri("memory://test")
        .fetch_size(fetch_size)
        .build()
        .unwrap();
    SessionFactory::with_driver(config, driver)
}

/// Yields until the driver has no open transaction left, so that rollbacks
/// spawned by dropped transactions get to run.
#[allow(dead_code)]
pub async fn settle(driver: &InMemoryDriver) {
    for _ in 0..16 {
        if driver.open_transactions() == 0 {
            break;
        }
        tokio::task::yield_now().await;
    }
}
