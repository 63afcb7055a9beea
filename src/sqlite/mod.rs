//! `SQLite` backend over `rusqlite`.
//!
//! rusqlite is synchronous; every call runs on tokio's blocking pool.

mod backend;
pub mod params;
pub mod query;

pub use backend::SqliteBackend;
pub use query::sqlite_extract_value_sync;
