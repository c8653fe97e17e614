//! Result-set fetching.
//!
//! A `ResultFetcher` moves through an explicit state machine:
//! metadata known → executing → iterating → exhausted. It binds one decode
//! slot per column, has the engine (re-)execute, then pulls and decodes rows
//! until the engine reports no more data or an error.

use std::sync::Arc;

use super::bind::BindSet;
use super::engine::FetchStatus;
use super::error::{MySqlError, MySqlResult};
use super::statement::PreparedStatement;
use super::types::Column;
use crate::executor::{QueryResult, Row, RowValues, SharedColumns};

/// Lifecycle of a fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    /// Column metadata known, decode slots allocated.
    MetadataKnown,
    /// Result slots handed to the engine.
    Executing,
    /// Rows are being pulled.
    Iterating,
    /// Slots and statement released.
    Exhausted,
}

/// Decodes the rows of one executed query.
#[derive(Debug)]
pub struct ResultFetcher {
    columns: Vec<Column>,
    names: SharedColumns,
    row: BindSet,
    state: FetchState,
}

impl ResultFetcher {
    /// Allocate one decode slot per column.
    pub fn prepare_result_decoding(columns: Vec<Column>) -> Self {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                tracing::debug!(column = %column.name, index = i, "duplicate column name, lookups by name see the first");
            }
        }
        let names: SharedColumns = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>().into();
        let row = BindSet::for_columns(&columns);
        Self {
            columns,
            names,
            row,
            state: FetchState::MetadataKnown,
        }
    }

    pub fn state(&self) -> FetchState {
        self.state
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Execute with the result slots bound and decode every row.
    ///
    /// The statement and all slot buffers are released before returning, on
    /// every path. A fetch error part way through keeps the rows collected
    /// so far and is reported through [`QueryResult::fetch_error`].
    pub fn fetch_execute_and_iterate(
        mut self,
        stmt: &mut PreparedStatement<'_>,
    ) -> MySqlResult<QueryResult> {
        let raw = match stmt.raw() {
            Ok(raw) => raw,
            Err(e) => {
                self.finish(stmt);
                return Err(e);
            }
        };
        let engine = stmt.engine();

        self.state = FetchState::Executing;
        if let Err(e) = engine.bind_result_execute(raw, &mut self.row) {
            self.finish(stmt);
            return Err(MySqlError::execute("bind result", e));
        }

        self.state = FetchState::Iterating;
        let mut rows = Vec::new();
        let mut fetch_error = None;
        let mut dropped_rows = 0;

        loop {
            match engine.fetch(raw, &mut self.row) {
                FetchStatus::NoData => break,
                FetchStatus::Error(e) => {
                    tracing::warn!(sql = %stmt.sql(), rows = rows.len(), error = %e, "fetch stopped on error");
                    fetch_error = Some(e);
                    break;
                }
                status => {
                    if status == FetchStatus::Truncated {
                        tracing::warn!(sql = %stmt.sql(), "row truncated to column buffer sizes");
                    }
                    match self.decode_row().map(|values| Row::assemble(&self.names, values)) {
                        Ok(Some(row)) => rows.push(row),
                        Ok(None) => {
                            tracing::error!(
                                sql = %stmt.sql(),
                                columns = self.names.len(),
                                values = self.row.len(),
                                "decoded value count does not match columns, dropping row"
                            );
                            dropped_rows += 1;
                        }
                        Err(e) => {
                            tracing::error!(sql = %stmt.sql(), error = %e, "row failed to decode, dropping row");
                            dropped_rows += 1;
                        }
                    }
                }
            }
        }

        self.finish(stmt);
        Ok(QueryResult::query(
            Arc::clone(&self.names),
            rows,
            fetch_error,
            dropped_rows,
        ))
    }

    fn decode_row(&self) -> MySqlResult<RowValues> {
        self.row
            .slots()
            .iter()
            .zip(&self.columns)
            .map(|(slot, column)| slot.decode(column))
            .collect()
    }

    fn finish(&mut self, stmt: &mut PreparedStatement<'_>) {
        self.row.release();
        stmt.release();
        self.state = FetchState::Exhausted;
    }
}
