use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::connection::ConnectionHandle;
use crate::error::DriverError;
use crate::types::DatabaseType;

/// Future returned by a connection creation hook.
pub type HookFuture<'c> = Pin<Box<dyn Future<Output = Result<(), DriverError>> + Send + 'c>>;

/// Hook awaited exactly once for every newly observed physical connection.
pub type CreateConnectionHook =
    Arc<dyn for<'c> Fn(&'c mut ConnectionHandle) -> HookFuture<'c> + Send + Sync>;

const DEFAULT_CONNECTION_TIMEOUT_MILLIS: u64 = 30_000;
const DEFAULT_IDLE_TIMEOUT_MILLIS: u64 = 10_000;
const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// Pool tuning handed to the backend-native pool.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Upper bound on how long `acquire` may wait for a connection. Must be non-zero.
    pub connection_timeout_millis: u64,
    /// Connections left in the pool this long after their last release are closed. `0`
    /// keeps them forever.
    pub idle_timeout_millis: u64,
    /// Maximum number of physical connections open at once.
    pub max_connections: usize,
    /// How long `destroy` waits for checked-out connections to come back.
    /// Defaults to the connection timeout.
    pub drain_timeout_millis: Option<u64>,
    #[serde(skip)]
    pub on_create_connection: Option<CreateConnectionHook>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection_timeout_millis: DEFAULT_CONNECTION_TIMEOUT_MILLIS,
            idle_timeout_millis: DEFAULT_IDLE_TIMEOUT_MILLIS,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            drain_timeout_millis: None,
            on_create_connection: None,
        }
    }
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("connection_timeout_millis", &self.connection_timeout_millis)
            .field("idle_timeout_millis", &self.idle_timeout_millis)
            .field("max_connections", &self.max_connections)
            .field("drain_timeout_millis", &self.drain_timeout_millis)
            .field(
                "on_create_connection",
                &self.on_create_connection.as_ref().map(|_| "<hook>"),
            )
            .finish()
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_millis = duration_millis(timeout);
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_millis = duration_millis(timeout);
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout_millis = Some(duration_millis(timeout));
        self
    }

    /// Register the creation hook.
    ///
    /// The hook receives the freshly acquired handle and may run queries on it (session
    /// settings, `search_path`, pragmas). A failing hook fails the `acquire` that triggered it
    /// and the physical connection is discarded.
    ///
    /// ```rust
    /// use sql_pool_driver::prelude::*;
    ///
    /// let pool = PoolConfig::default().on_create_connection(|conn| {
    ///     Box::pin(async move {
    ///         conn.execute_query(&CompiledQuery::new_without_params("SET TIME ZONE 'UTC'"))
    ///             .await?;
    ///         Ok(())
    ///     })
    /// });
    /// # let _ = pool;
    /// ```
    #[must_use]
    pub fn on_create_connection<F>(mut self, hook: F) -> Self
    where
        F: for<'c> Fn(&'c mut ConnectionHandle) -> HookFuture<'c> + Send + Sync + 'static,
    {
        self.on_create_connection = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_millis)
    }

    /// `None` when idle reaping is disabled.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_millis > 0).then(|| Duration::from_millis(self.idle_timeout_millis))
    }

    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(
            self.drain_timeout_millis
                .unwrap_or(self.connection_timeout_millis),
        )
    }

    fn validate(&self) -> Result<(), DriverError> {
        if self.max_connections == 0 {
            return Err(DriverError::ConfigError(
                "maxConnections must be at least 1".to_string(),
            ));
        }
        if self.connection_timeout_millis == 0 {
            return Err(DriverError::ConfigError(
                "connectionTimeoutMillis must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for one driver.
///
/// `database` is the database name for `PostgreSQL` and the file path (or `file:` URI) for
/// `SQLite`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    pub database_type: DatabaseType,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub pool: PoolConfig,
}

impl DriverConfig {
    #[must_use]
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            pool: PoolConfig::default(),
        }
    }

    #[must_use]
    pub fn postgres(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self::new(DatabaseType::Postgres)
            .with_host(host)
            .with_database(database)
    }

    #[must_use]
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::new(DatabaseType::Sqlite).with_database(path)
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Configured port, falling back to the backend default.
    #[must_use]
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or_else(|| self.database_type.default_port())
    }

    /// Check that the fields the configured backend needs are present.
    ///
    /// # Errors
    /// Returns `DriverError::ConfigError` naming the first missing or invalid field.
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.database.as_deref().is_none_or(str::is_empty) {
            return Err(DriverError::ConfigError("database is required".to_string()));
        }
        if self.database_type == DatabaseType::Postgres {
            if self.host.as_deref().is_none_or(str::is_empty) {
                return Err(DriverError::ConfigError("host is required".to_string()));
            }
            if self.user.as_deref().is_none_or(str::is_empty) {
                return Err(DriverError::ConfigError("user is required".to_string()));
            }
        }
        self.pool.validate()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
