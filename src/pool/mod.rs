//! The backend-native pool and the narrow protocol the driver uses to talk to it.
//!
//! The pool itself is `deadpool`; [`adapter`] erases the backend type so the driver only
//! deals with [`NativePool`] and [`NativeLease`] trait objects.

mod adapter;
mod manager;

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::error::DriverError;
use crate::results::QueryResult;
use crate::types::CompiledQuery;

pub(crate) use adapter::BackendPoolFactory;
pub use manager::ConnectionId;

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Configured upper bound of physical connections.
    pub max_connections: usize,
    /// Physical connections currently open, idle or checked out.
    pub size: usize,
    /// Open connections waiting in the pool.
    pub idle: usize,
}

/// Builds a pool for one resolved backend.
pub(crate) trait PoolFactory: Send + Sync {
    fn name(&self) -> &'static str;

    fn build_pool(&self, config: &PoolConfig) -> Result<Arc<dyn NativePool>, DriverError>;
}

#[async_trait]
pub(crate) trait NativePool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Wait for a free connection, or room to open one, bounded by the connection timeout.
    async fn checkout(&self) -> Result<Box<dyn NativeLease>, DriverError>;

    /// Close the pool and wait for checked-out connections to come back.
    ///
    /// Returns `false` when `timeout` elapsed with connections still outstanding.
    async fn drain(&self, timeout: Duration) -> bool;

    fn status(&self) -> PoolStatus;
}

/// One physical connection checked out of the pool. Dropping it returns it to the pool.
#[async_trait]
pub(crate) trait NativeLease: Send {
    fn id(&self) -> ConnectionId;

    /// Weak reference that dies with the physical connection.
    fn anchor(&self) -> Weak<()>;

    async fn execute(&mut self, query: &CompiledQuery) -> Result<QueryResult, DriverError>;

    /// Remove the connection from the pool and close it instead of returning it.
    fn discard(self: Box<Self>);
}
