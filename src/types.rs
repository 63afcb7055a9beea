use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or bound as query parameters.
///
/// The same enum is used by every backend, so a compiled query can be handed to any driver:
/// ```rust
/// use sql_pool_driver::prelude::*;
///
/// let query = CompiledQuery::new(
///     "UPDATE person SET name = $1 WHERE id = $2",
///     vec![RowValues::Text("alice".into()), RowValues::Int(1)],
/// );
/// # let _ = query;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // SQLite stores timestamps as text
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

/// The database backends this crate knows how to load.
///
/// Every variant exists regardless of enabled features; whether the backend client is
/// actually compiled in is decided by the [`BackendLoader`](crate::backend::BackendLoader)
/// during `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// `PostgreSQL` database
    Postgres,
    /// `SQLite` database
    Sqlite,
}

impl DatabaseType {
    /// Port the backend listens on when the configuration leaves it out.
    ///
    /// `SQLite` is file based and has no port.
    #[must_use]
    pub fn default_port(self) -> Option<u16> {
        match self {
            DatabaseType::Postgres => Some(5432),
            DatabaseType::Sqlite => None,
        }
    }

    /// Cargo feature that compiles this backend's client in.
    #[must_use]
    pub fn feature_name(self) -> &'static str {
        match self {
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// Native client crate backing this database type.
    #[must_use]
    pub fn client_crate(self) -> &'static str {
        match self {
            DatabaseType::Postgres => "tokio-postgres",
            DatabaseType::Sqlite => "rusqlite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseType::Postgres => f.write_str("postgres"),
            DatabaseType::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// A compiled statement and its positional bindings.
///
/// Produced by a query compiler; the order of `bindings` matches the placeholders embedded
/// in `sql` (`$1, $2, ...` for `PostgreSQL`, `?1, ?2, ...` or `?` for `SQLite`).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// The SQL statement text
    pub sql: String,
    /// The parameters bound to the statement, in placeholder order
    pub bindings: Vec<RowValues>,
}

impl CompiledQuery {
    /// Create a new `CompiledQuery` with the given statement text and bindings
    pub fn new(sql: impl Into<String>, bindings: Vec<RowValues>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Create a new `CompiledQuery` with no bindings
    pub fn new_without_params(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}
