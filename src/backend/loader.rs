use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::types::DatabaseType;

use super::LoadedBackend;

/// Resolves the backend client for a configuration.
///
/// Runs once per driver, inside `init`. A backend that cannot be provided must be reported as
/// [`DriverError::MissingDependency`] so the failure surfaces before any connection is
/// attempted.
pub trait BackendLoader: Send + Sync {
    /// # Errors
    /// Returns `MissingDependency` when the backend is unavailable, or `ConfigError` when the
    /// configuration cannot be turned into client settings.
    fn load(&self, config: &DriverConfig) -> Result<LoadedBackend, DriverError>;
}

impl<F> BackendLoader for F
where
    F: Fn(&DriverConfig) -> Result<LoadedBackend, DriverError> + Send + Sync,
{
    fn load(&self, config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
        self(config)
    }
}

/// Loader for the backends compiled into this build via cargo features.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompiledBackends;

impl BackendLoader for CompiledBackends {
    fn load(&self, config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
        match config.database_type {
            DatabaseType::Postgres => load_postgres(config),
            DatabaseType::Sqlite => load_sqlite(config),
        }
    }
}

/// Build the error reported when a backend's client is not compiled in.
#[must_use]
pub fn missing_dependency(database_type: DatabaseType) -> DriverError {
    DriverError::MissingDependency(format!(
        "the {database_type} backend needs the `{}` client, which is not part of this build; \
         enable the `{}` feature of sql-pool-driver",
        database_type.client_crate(),
        database_type.feature_name(),
    ))
}

#[cfg(feature = "postgres")]
fn load_postgres(config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
    let backend = crate::postgres::PostgresBackend::from_config(config)?;
    Ok(LoadedBackend::new(backend))
}

#[cfg(not(feature = "postgres"))]
fn load_postgres(_config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
    Err(missing_dependency(DatabaseType::Postgres))
}

#[cfg(feature = "sqlite")]
fn load_sqlite(config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
    let backend = crate::sqlite::SqliteBackend::from_config(config)?;
    Ok(LoadedBackend::new(backend))
}

#[cfg(not(feature = "sqlite"))]
fn load_sqlite(_config: &DriverConfig) -> Result<LoadedBackend, DriverError> {
    Err(missing_dependency(DatabaseType::Sqlite))
}
