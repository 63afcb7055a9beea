use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::Connection;

use super::query::execute_blocking;
use crate::backend::Backend;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::results::QueryResult;
use crate::types::{CompiledQuery, DatabaseType};

/// Shared handle so the connection can move onto a blocking thread per call.
pub type SqliteConnection = Arc<Mutex<Connection>>;

/// `SQLite` over `rusqlite`. `database` is a file path or `file:` URI.
///
/// Each pooled connection opens the database separately, so `:memory:` gives every connection
/// its own private database.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: String,
    busy_timeout: Duration,
}

impl SqliteBackend {
    /// # Errors
    /// Returns `ConfigError` if the configuration is not for `SQLite` or has no path.
    pub fn from_config(config: &DriverConfig) -> Result<Self, DriverError> {
        if config.database_type != DatabaseType::Sqlite {
            return Err(DriverError::ConfigError(format!(
                "sqlite backend cannot serve a {} configuration",
                config.database_type
            )));
        }
        let path = config
            .database
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                DriverError::ConfigError("sqlite: database path is required".to_string())
            })?;

        Ok(Self {
            path: path.to_string(),
            busy_timeout: config.pool.connection_timeout(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    type Connection = SqliteConnection;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&self) -> Result<SqliteConnection, DriverError> {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let opened = tokio::task::spawn_blocking(move || -> rusqlite::Result<Connection> {
            let conn = Connection::open(&path)?;
            conn.busy_timeout(busy_timeout)?;
            Ok(conn)
        })
        .await
        .map_err(|e| DriverError::acquisition_with(format!("sqlite open task failed: {e}"), e))?;

        let conn = opened.map_err(|e| {
            DriverError::acquisition_with(
                format!("could not open sqlite database {}: {e}", self.path),
                e,
            )
        })?;
        Ok(Arc::new(Mutex::new(conn)))
    }

    async fn ping(&self, conn: &mut SqliteConnection) -> Result<(), DriverError> {
        let conn = Arc::clone(conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            guard.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        })
        .await
        .map_err(|e| DriverError::acquisition_with(format!("sqlite ping task failed: {e}"), e))?
        .map(|_| ())
        .map_err(|e| DriverError::acquisition_with(format!("sqlite ping failed: {e}"), e))
    }

    async fn execute(
        &self,
        conn: &mut SqliteConnection,
        query: &CompiledQuery,
    ) -> Result<QueryResult, DriverError> {
        let conn = Arc::clone(conn);
        let query = query.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            execute_blocking(&guard, &query)
        })
        .await?
    }

    fn is_broken(&self, conn: &SqliteConnection) -> bool {
        // a panic mid-statement leaves the connection in an unknown state
        conn.is_poisoned()
    }
}
