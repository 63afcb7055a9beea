use postgresql_embedded::PostgreSQL;

use crate::config::{DriverConfig, PoolConfig};
use crate::driver::Driver;
use crate::types::CompiledQuery;

/// A running embedded `PostgreSQL` instance and a driver configuration pointing at it.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
    /// Credentials and port of the running server, ready for `Driver::new`.
    pub config: DriverConfig,
}

impl std::fmt::Debug for EmbeddedPostgres {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedPostgres")
            .field("port", &self.port)
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

/// Start an embedded `PostgreSQL`, create `database`, and check it accepts queries.
///
/// # Errors
/// Returns an error if the server cannot be set up or started, or if database provisioning or
/// the post-start connectivity check fails.
pub async fn setup_postgres_embedded(
    database: &str,
    pool: PoolConfig,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error + Send + Sync>> {
    let mut postgresql = PostgreSQL::default();
    postgresql.setup().await?;
    postgresql.start().await?;

    let settings = postgresql.settings();
    let port = settings.port;
    let host = settings.host.clone();
    let user = settings.username.clone();
    let password = settings.password.clone();

    postgresql.create_database(database).await?;

    let database_url = format!("postgres://{user}:{password}@{host}:{port}/{database}");
    let config = DriverConfig::postgres(host, database)
        .with_port(port)
        .with_user(user)
        .with_password(password)
        .with_pool(pool);

    let ready_check = Driver::new(config.clone());
    ready_check.init().await?;
    let mut conn = ready_check.acquire().await?;
    conn.execute_query(&CompiledQuery::new_without_params("SELECT 1"))
        .await?;
    ready_check.release(conn)?;
    ready_check.destroy().await;

    tracing::info!(port, "embedded postgres started");

    Ok(EmbeddedPostgres {
        postgresql,
        port,
        database_url,
        config,
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub async fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    if let Err(e) = postgresql.stop().await {
        tracing::warn!(error = %e, "failed to stop embedded postgres");
    }
}
