//! Backend plumbing.
//!
//! A [`Backend`] knows how to open one physical connection and run a compiled statement on
//! it. The driver never talks to a backend directly: a [`BackendLoader`] resolves it during
//! `init`, and the resulting [`LoadedBackend`] builds the pool the driver owns.

pub mod loader;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::error::DriverError;
use crate::pool::{BackendPoolFactory, NativePool, PoolFactory};
use crate::results::QueryResult;
use crate::types::CompiledQuery;

pub use loader::{BackendLoader, CompiledBackends, missing_dependency};

/// A database client the driver can pool.
///
/// Implementations translate native errors into [`DriverError`]: connect failures as
/// `ConnectionAcquisition`, statement failures as `QueryExecution`.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// The native physical connection handle.
    type Connection: Send + 'static;

    /// Short name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Open a new physical connection.
    async fn connect(&self) -> Result<Self::Connection, DriverError>;

    /// Cheap liveness check run before an idle connection is handed out again.
    async fn ping(&self, conn: &mut Self::Connection) -> Result<(), DriverError>;

    /// Run one compiled statement.
    async fn execute(
        &self,
        conn: &mut Self::Connection,
        query: &CompiledQuery,
    ) -> Result<QueryResult, DriverError>;

    /// Whether the connection is known to be unusable without a round trip.
    fn is_broken(&self, _conn: &Self::Connection) -> bool {
        false
    }
}

/// A resolved backend, ready to build the driver's pool.
#[derive(Clone)]
pub struct LoadedBackend {
    factory: Arc<dyn PoolFactory>,
}

impl LoadedBackend {
    pub fn new<B: Backend>(backend: B) -> Self {
        Self {
            factory: Arc::new(BackendPoolFactory::new(backend)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.factory.name()
    }

    pub(crate) fn build_pool(
        &self,
        config: &PoolConfig,
    ) -> Result<Arc<dyn NativePool>, DriverError> {
        self.factory.build_pool(config)
    }
}

impl std::fmt::Debug for LoadedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("LoadedBackend").field(&self.name()).finish()
    }
}
