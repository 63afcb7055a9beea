use async_trait::async_trait;
use tokio_postgres::{Client, Config as PgConfig, NoTls};

use super::query::execute_compiled;
use crate::backend::Backend;
use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::results::QueryResult;
use crate::types::{CompiledQuery, DatabaseType};

const APPLICATION_NAME: &str = "sql-pool-driver";

/// `PostgreSQL` over `tokio-postgres`, without TLS.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    config: PgConfig,
    target: String,
}

impl PostgresBackend {
    /// Build client settings from a validated driver configuration.
    ///
    /// # Errors
    /// Returns `ConfigError` if host, database, or user is missing.
    pub fn from_config(config: &DriverConfig) -> Result<Self, DriverError> {
        if config.database_type != DatabaseType::Postgres {
            return Err(DriverError::ConfigError(format!(
                "postgres backend cannot serve a {} configuration",
                config.database_type
            )));
        }
        let host = required(config.host.as_deref(), "host")?;
        let dbname = required(config.database.as_deref(), "database")?;
        let user = required(config.user.as_deref(), "user")?;
        let port = config
            .port_or_default()
            .ok_or_else(|| DriverError::ConfigError("postgres: port is required".to_string()))?;

        let mut pg = PgConfig::new();
        pg.host(host)
            .port(port)
            .dbname(dbname)
            .user(user)
            .application_name(APPLICATION_NAME)
            .connect_timeout(config.pool.connection_timeout());
        if let Some(password) = config.password.as_deref() {
            pg.password(password);
        }

        Ok(Self {
            config: pg,
            target: format!("{host}:{port}/{dbname}"),
        })
    }

    /// `host:port/database`, for logs.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, DriverError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| DriverError::ConfigError(format!("postgres: {field} is required")))
}

#[async_trait]
impl Backend for PostgresBackend {
    type Connection = Client;

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn connect(&self) -> Result<Client, DriverError> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(|e| {
            DriverError::acquisition_with(
                format!("could not connect to postgres at {}: {e}", self.target),
                e,
            )
        })?;

        let target = self.target.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(target_db = %target, error = %e, "postgres connection terminated");
            }
        });

        Ok(client)
    }

    async fn ping(&self, conn: &mut Client) -> Result<(), DriverError> {
        conn.simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| DriverError::acquisition_with(format!("postgres ping failed: {e}"), e))
    }

    async fn execute(
        &self,
        conn: &mut Client,
        query: &CompiledQuery,
    ) -> Result<QueryResult, DriverError> {
        execute_compiled(conn, query).await
    }

    fn is_broken(&self, conn: &Client) -> bool {
        conn.is_closed()
    }
}
