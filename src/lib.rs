//! Pluggable async database driver.
//!
//! A [`Driver`] owns one connection pool for its lifetime: `init` resolves the backend and
//! builds the pool, `acquire`/`release` hand out [`ConnectionHandle`]s that run
//! [`CompiledQuery`]s, and `destroy` drains everything. Backends are `tokio-postgres` and
//! `rusqlite`, each behind a cargo feature; custom backends implement [`Backend`].

pub mod backend;
pub mod command;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
mod identity;
pub mod pool;
pub mod prelude;
pub mod results;
pub mod types;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use backend::{Backend, BackendLoader, CompiledBackends, LoadedBackend};
pub use command::CommandKind;
pub use config::{CreateConnectionHook, DriverConfig, HookFuture, PoolConfig};
pub use connection::{ConnectionHandle, DriverConnection};
pub use driver::{Driver, DriverId, LifecycleState};
pub use error::{DriverError, ErrorKind};
pub use pool::{ConnectionId, PoolStatus};
pub use results::{CustomDbRow, QueryResult, QueryResultBuilder};
pub use types::{CompiledQuery, DatabaseType, RowValues};

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
