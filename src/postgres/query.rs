use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::{TryStreamExt, pin_mut};
use serde_json::Value;
use tokio_postgres::{Client, Row};

use super::params::as_params;
use crate::command::CommandKind;
use crate::error::DriverError;
use crate::results::{QueryResult, QueryResultBuilder};
use crate::types::{CompiledQuery, RowValues};

/// Prepare and run one statement, collecting every row and the affected-row count.
///
/// # Errors
/// Returns `QueryExecution` for prepare, bind, execution, and decode failures.
pub(crate) async fn execute_compiled(
    client: &Client,
    query: &CompiledQuery,
) -> Result<QueryResult, DriverError> {
    let kind = CommandKind::classify(&query.sql);
    let stmt = client.prepare(&query.sql).await?;

    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let mut builder = QueryResultBuilder::new(column_names, 0);

    let stream = client.query_raw(&stmt, as_params(&query.bindings)).await?;
    pin_mut!(stream);
    while let Some(row) = stream.try_next().await? {
        let mut row_values = Vec::with_capacity(builder.column_count());
        for idx in 0..builder.column_count() {
            row_values.push(postgres_extract_value(&row, idx)?);
        }
        builder.push_row(row_values);
    }

    Ok(builder.finish(kind, stream.rows_affected(), None))
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `QueryExecution` if the column cannot be decoded.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, DriverError> {
    let type_info = row.columns()[idx].type_();

    match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::Int))
        }
        "float4" => {
            let val: Option<f32> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))))
        }
        "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::Float))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::Bool))
        }
        "timestamp" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::Timestamp))
        }
        "timestamptz" => {
            let val: Option<DateTime<Utc>> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())))
        }
        "date" => {
            let val: Option<NaiveDate> = row.try_get(idx)?;
            Ok(val
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map_or(RowValues::Null, RowValues::Timestamp))
        }
        "json" | "jsonb" => {
            let val: Option<Value> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::JSON))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(RowValues::Null, RowValues::Blob))
        }
        _ => {
            // text, varchar, bpchar, name and anything else with a text representation
            let val: Option<String> = row.try_get(idx).map_err(|e| {
                DriverError::execution_with(
                    format!(
                        "postgres: column {} has unsupported type {}",
                        row.columns()[idx].name(),
                        type_info.name()
                    ),
                    e,
                )
            })?;
            Ok(val.map_or(RowValues::Null, RowValues::Text))
        }
    }
}
