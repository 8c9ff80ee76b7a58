use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::{debug, info};

use crate::{
    config::{Configuration, DriverKind},
    driver::{memory::InMemoryDriver, Driver},
    error::{Error, OgmResult},
    session::{Session, SessionId},
};

/// Hands out [`Session`]s sharing a single driver.
pub struct SessionFactory {
    config: Configuration,
    driver: Arc<dyn Driver>,
    next_session_id: AtomicU64,
}

impl SessionFactory {
    /// Creates a factory with the driver the configured URI calls for.
    pub fn new(config: Configuration) -> OgmResult<SessionFactory> {
        let driver: Arc<dyn Driver> = match config.driver_kind() {
            DriverKind::Memory => Arc::new(InMemoryDriver::from_config(&config)),
            kind => {
                return Err(Error::configuration(format!(
                    "no {kind} driver is available; provide one with `SessionFactory::with_driver`"
                )))
            }
        };
        Ok(SessionFactory::with_driver(config, driver))
    }

    /// Creates a factory over a caller-provided driver.
    pub fn with_driver(config: Configuration, driver: Arc<dyn Driver>) -> SessionFactory {
        info!(
            uri = config.uri(),
            driver = driver.name(),
            pool_size = config.connection_pool_size(),
            "session factory ready"
        );
        SessionFactory {
            config,
            driver,
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn open_session(&self) -> Session {
        let id: SessionId = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, "opened session");
        Session::new(id, Arc::clone(&self.driver), self.config.fetch_size())
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    /// Closes the driver. Sessions still around fail to begin transactions
    /// afterwards.
    pub async fn close(&self) {
        self.driver.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_memory_driver_ships() {
        let config = Configuration::builder().uri("bolt://localhost").build().unwrap();
        assert!(SessionFactory::new(config).err().unwrap().is_configuration());
    }

    #[tokio::test]
    async fn test_session_ids_increase() {
        let config = Configuration::builder().uri("memory://test").build().unwrap();
        let factory = SessionFactory::new(config).unwrap();
        let first = factory.open_session();
        let second = factory.open_session();
        assert!(second.id() > first.id());
        assert_eq!(factory.driver().name(), "memory");

        factory.close().await;
        let mut third = factory.open_session();
        assert!(third.begin_transaction().await.unwrap_err().is_transport());
    }
}
