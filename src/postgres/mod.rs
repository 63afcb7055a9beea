//! `PostgreSQL` backend over `tokio-postgres`.

mod backend;
pub mod params;
pub mod query;

pub use backend::PostgresBackend;
pub use query::postgres_extract_value;
