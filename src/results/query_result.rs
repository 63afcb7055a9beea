use std::collections::HashMap;
use std::sync::Arc;

use super::row::{CustomDbRow, index_columns};
use crate::command::CommandKind;
use crate::types::RowValues;

/// Normalized outcome of executing one compiled statement.
///
/// The value is immutable once returned: fields are only reachable through accessors, and
/// cloning shares nothing mutable with the original.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    num_updated_or_deleted_rows: Option<u64>,
    inserted_primary_key: Option<RowValues>,
    column_names: Arc<Vec<String>>,
    rows: Vec<CustomDbRow>,
}

impl QueryResult {
    /// Rows touched by an `UPDATE` or `DELETE`; `None` for every other command kind.
    #[must_use]
    pub fn num_updated_or_deleted_rows(&self) -> Option<u64> {
        self.num_updated_or_deleted_rows
    }

    /// Key of the row created by an `INSERT`, for backends that report it.
    #[must_use]
    pub fn inserted_primary_key(&self) -> Option<&RowValues> {
        self.inserted_primary_key.as_ref()
    }

    /// Result rows in the order the backend produced them.
    #[must_use]
    pub fn rows(&self) -> &[CustomDbRow] {
        &self.rows
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Take ownership of the rows, discarding the metadata.
    #[must_use]
    pub fn into_rows(self) -> Vec<CustomDbRow> {
        self.rows
    }
}

/// Accumulates backend rows and produces a [`QueryResult`].
///
/// Every row shares one column-name vector and one name-to-index map.
#[derive(Debug)]
pub struct QueryResultBuilder {
    column_names: Arc<Vec<String>>,
    column_index: Arc<HashMap<String, usize>>,
    rows: Vec<CustomDbRow>,
}

impl QueryResultBuilder {
    #[must_use]
    pub fn new(column_names: Vec<String>, capacity: usize) -> Self {
        let column_index = Arc::new(index_columns(&column_names));
        Self {
            column_names: Arc::new(column_names),
            column_index,
            rows: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.column_names.len()
    }

    /// Append one row. Values are positional and must follow the column order.
    pub fn push_row(&mut self, values: Vec<RowValues>) {
        self.rows.push(CustomDbRow::with_index(
            Arc::clone(&self.column_names),
            Arc::clone(&self.column_index),
            values,
        ));
    }

    /// Finish the result. `affected` is only kept when `kind` is `UPDATE` or `DELETE`.
    #[must_use]
    pub fn finish(
        self,
        kind: CommandKind,
        affected: Option<u64>,
        inserted_primary_key: Option<RowValues>,
    ) -> QueryResult {
        QueryResult {
            num_updated_or_deleted_rows: if kind.reports_affected_rows() {
                affected
            } else {
                None
            },
            inserted_primary_key,
            column_names: self.column_names,
            rows: self.rows,
        }
    }
}
