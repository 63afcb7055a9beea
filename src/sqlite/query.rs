use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use super::params::convert;
use crate::command::CommandKind;
use crate::error::DriverError;
use crate::results::{QueryResult, QueryResultBuilder};
use crate::types::{CompiledQuery, RowValues};

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `QueryExecution` if the value cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, DriverError> {
    let value: Value = row.get(idx)?;
    match value {
        Value::Null => Ok(RowValues::Null),
        Value::Integer(i) => Ok(RowValues::Int(i)),
        Value::Real(f) => Ok(RowValues::Float(f)),
        Value::Text(s) => Ok(RowValues::Text(s)),
        Value::Blob(b) => Ok(RowValues::Blob(b)),
    }
}

/// Run one statement on a blocking thread's connection.
///
/// Statements without result columns go through `execute`; anything with columns, including
/// `... RETURNING`, is stepped as a query.
///
/// # Errors
/// Returns `QueryExecution` wrapping the rusqlite error.
pub(crate) fn execute_blocking(
    conn: &Connection,
    query: &CompiledQuery,
) -> Result<QueryResult, DriverError> {
    let kind = CommandKind::classify(&query.sql);
    let params = convert(&query.bindings);
    let mut stmt = conn.prepare(&query.sql)?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let mut builder = QueryResultBuilder::new(column_names, 0);

    if builder.column_count() == 0 {
        stmt.execute(params_from_iter(params.iter()))?;
    } else {
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = rows.next()? {
            let mut row_values = Vec::with_capacity(builder.column_count());
            for idx in 0..builder.column_count() {
                row_values.push(sqlite_extract_value_sync(row, idx)?);
            }
            builder.push_row(row_values);
        }
    }

    let affected = u64::try_from(conn.changes()).ok();
    let inserted = (kind == CommandKind::Insert).then(|| RowValues::Int(conn.last_insert_rowid()));
    Ok(builder.finish(kind, affected, inserted))
}
