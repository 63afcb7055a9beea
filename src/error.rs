use thiserror::Error;

/// Boxed native error kept as the `source` of a [`DriverError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DriverError {
    /// The backend client for the configured database type is not available.
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// An operation was invoked outside the lifecycle window it is valid in.
    #[error("Invalid driver state: {0}")]
    InvalidState(String),

    /// The pool could not hand out a connection (timeout, closed, connect failure).
    #[error("Connection acquisition error: {message}")]
    ConnectionAcquisition {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The backend rejected or failed a statement.
    #[error("Query execution error: {message}")]
    QueryExecution {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A connection handle was released to a driver that did not issue it.
    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Field-less discriminant of [`DriverError`], handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingDependency,
    InvalidState,
    ConnectionAcquisition,
    QueryExecution,
    InvalidConnection,
    Config,
}

impl DriverError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::MissingDependency(_) => ErrorKind::MissingDependency,
            DriverError::InvalidState(_) => ErrorKind::InvalidState,
            DriverError::ConnectionAcquisition { .. } => ErrorKind::ConnectionAcquisition,
            DriverError::QueryExecution { .. } => ErrorKind::QueryExecution,
            DriverError::InvalidConnection(_) => ErrorKind::InvalidConnection,
            DriverError::ConfigError(_) => ErrorKind::Config,
        }
    }

    pub fn acquisition(message: impl Into<String>) -> Self {
        DriverError::ConnectionAcquisition {
            message: message.into(),
            source: None,
        }
    }

    pub fn acquisition_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        DriverError::ConnectionAcquisition {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        DriverError::QueryExecution {
            message: message.into(),
            source: None,
        }
    }

    pub fn execution_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        DriverError::QueryExecution {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Re-label any error raised while a connection was being set up as an acquisition failure.
    ///
    /// Execution errors coming out of a creation hook keep their detail as the source.
    #[must_use]
    pub fn into_acquisition(self, context: &str) -> Self {
        match self {
            err @ DriverError::ConnectionAcquisition { .. } => err,
            other => DriverError::ConnectionAcquisition {
                message: format!("{context}: {other}"),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(feature = "postgres")]
impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        use std::fmt::Write as _;

        let message = match err.as_db_error() {
            Some(db) => {
                let mut msg = format!(
                    "{}: {} (SQLSTATE {})",
                    db.severity(),
                    db.message(),
                    db.code().code()
                );
                if let Some(detail) = db.detail() {
                    let _ = write!(msg, "; detail: {detail}");
                }
                if let Some(hint) = db.hint() {
                    let _ = write!(msg, "; hint: {hint}");
                }
                msg
            }
            None => err.to_string(),
        };
        DriverError::execution_with(format!("postgres: {message}"), err)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        DriverError::execution_with(format!("sqlite: {err}"), err)
    }
}

impl From<tokio::task::JoinError> for DriverError {
    fn from(err: tokio::task::JoinError) -> Self {
        DriverError::execution_with(format!("blocking task failed: {err}"), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn kinds_match_variants() {
        assert_eq!(
            DriverError::MissingDependency("x".into()).kind(),
            ErrorKind::MissingDependency
        );
        assert_eq!(DriverError::acquisition("timed out").kind(), ErrorKind::ConnectionAcquisition);
        assert_eq!(DriverError::execution("boom").kind(), ErrorKind::QueryExecution);
        assert_eq!(DriverError::ConfigError("x".into()).kind(), ErrorKind::Config);
    }

    #[test]
    fn into_acquisition_keeps_original_as_source() {
        let err = DriverError::execution("relation \"missing\" does not exist")
            .into_acquisition("connection setup hook failed");
        assert_eq!(err.kind(), ErrorKind::ConnectionAcquisition);
        assert!(err.to_string().contains("relation \"missing\" does not exist"));
        let source = err.source().expect("source kept");
        assert!(source.to_string().contains("missing"));
    }

    #[test]
    fn acquisition_errors_are_not_rewrapped() {
        let err = DriverError::acquisition("pool timed out").into_acquisition("ctx");
        assert_eq!(err.to_string(), "Connection acquisition error: pool timed out");
    }
}
