//! Convenient imports for common functionality.
//!
//! This module re-exports the types most callers need to configure a driver and run
//! queries through it.

pub use crate::backend::{Backend, BackendLoader, LoadedBackend};
pub use crate::config::{DriverConfig, HookFuture, PoolConfig};
pub use crate::connection::ConnectionHandle;
pub use crate::driver::{Driver, LifecycleState};
pub use crate::error::{DriverError, ErrorKind};
pub use crate::results::{CustomDbRow, QueryResult};
pub use crate::types::{CompiledQuery, DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresBackend;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteBackend;
