//! Query results.
//!
//! Rows are materialized eagerly. Each row shares its column names with the
//! result through an `Arc`, and stores values inline for typical widths.

use smallvec::SmallVec;
use std::sync::Arc;

use crate::mysql::{EngineError, MySqlError, MySqlResult, Value};

/// Column names shared by every row of one result.
pub type SharedColumns = Arc<[String]>;

/// Decoded values of one row, in column order.
/// Uses SmallVec to inline storage for rows with ≤16 columns.
pub type RowValues = SmallVec<[Option<Value>; 16]>;

// ============================================================================
// Row
// ============================================================================

/// One result row: column name to optional value, in query column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: SharedColumns,
    values: RowValues,
}

impl Row {
    /// Pair decoded values with column names.
    ///
    /// Returns `None` when the counts disagree.
    pub(crate) fn assemble(columns: &SharedColumns, values: RowValues) -> Option<Self> {
        if values.len() != columns.len() {
            return None;
        }
        Some(Self {
            columns: Arc::clone(columns),
            values,
        })
    }

    /// A row with no columns.
    pub fn empty() -> Self {
        Self {
            columns: Arc::from(Vec::<String>::new()),
            values: SmallVec::new(),
        }
    }

    /// Value of a column; `None` when the column is missing or NULL.
    ///
    /// When several columns share the name, the first one wins; use
    /// [`Row::get_index`] to reach the others.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).and_then(|i| self.values[i].as_ref())
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Check whether the row has a column with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_ref))
    }
}

// ============================================================================
// Query Result
// ============================================================================

/// Whether the statement produced a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// The statement returned column metadata and rows.
    Query,
    /// The statement returned no metadata (INSERT, UPDATE, DDL, ...).
    Statement,
}

/// Result of executing one statement.
///
/// Statements without a result set carry a single row with no columns, and
/// report the engine's affected-row count.
#[derive(Debug)]
pub struct QueryResult {
    kind: ResultKind,
    columns: SharedColumns,
    rows: Vec<Row>,
    rows_affected: u64,
    /// Set when fetching stopped on an engine error rather than end of data
    fetch_error: Option<EngineError>,
    /// Rows dropped because their decoded values did not match the columns
    dropped_rows: usize,
}

impl QueryResult {
    pub(crate) fn statement(rows_affected: u64) -> Self {
        Self {
            kind: ResultKind::Statement,
            columns: Arc::from(Vec::<String>::new()),
            rows: vec![Row::empty()],
            rows_affected,
            fetch_error: None,
            dropped_rows: 0,
        }
    }

    pub(crate) fn query(
        columns: SharedColumns,
        rows: Vec<Row>,
        fetch_error: Option<EngineError>,
        dropped_rows: usize,
    ) -> Self {
        Self {
            kind: ResultKind::Query,
            columns,
            rows_affected: rows.len() as u64,
            rows,
            fetch_error,
            dropped_rows,
        }
    }

    #[inline]
    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    #[inline]
    pub fn is_query(&self) -> bool {
        self.kind == ResultKind::Query
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rowcount(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows changed by a statement, or rows returned by a query.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The only row, failing unless there is exactly one.
    pub fn one(&self) -> MySqlResult<&Row> {
        match self.rows.as_slice() {
            [row] => Ok(row),
            rows => Err(MySqlError::RowCount {
                expected: "exactly 1",
                actual: rows.len(),
            }),
        }
    }

    /// The only row if there is one, `None` for an empty result.
    pub fn one_or_none(&self) -> MySqlResult<Option<&Row>> {
        match self.rows.as_slice() {
            [] => Ok(None),
            [row] => Ok(Some(row)),
            rows => Err(MySqlError::RowCount {
                expected: "at most 1",
                actual: rows.len(),
            }),
        }
    }

    /// First column of the first row.
    pub fn scalar(&self) -> Option<&Value> {
        self.first().and_then(|row| row.get_index(0))
    }

    /// All values of one column.
    pub fn column(&self, name: &str) -> Vec<Option<&Value>> {
        match self.columns.iter().position(|c| c == name) {
            Some(i) => self.rows.iter().map(|row| row.get_index(i)).collect(),
            None => Vec::new(),
        }
    }

    /// The engine error that stopped fetching early, if any.
    pub fn fetch_error(&self) -> Option<&EngineError> {
        self.fetch_error.as_ref()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    /// Check that every row was fetched and decoded.
    pub fn is_complete(&self) -> bool {
        self.fetch_error.is_none() && self.dropped_rows == 0
    }

    /// Take the rows, failing if fetching stopped on an error.
    pub fn into_rows(self) -> MySqlResult<Vec<Row>> {
        match self.fetch_error {
            Some(e) => Err(MySqlError::execute("fetch", e)),
            None => Ok(self.rows),
        }
    }
}
