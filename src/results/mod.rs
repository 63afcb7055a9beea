pub mod query_result;
pub mod row;

pub use query_result::{QueryResult, QueryResultBuilder};
pub use row::CustomDbRow;
