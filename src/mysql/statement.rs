//! Prepared statement execution.
//!
//! A `PreparedStatement` owns a native statement and its parameter slots.
//! Executing binds parameters through the type codec, runs the statement and,
//! when the engine reports result metadata, hands off to a [`ResultFetcher`].

use super::bind::BindSet;
use super::connection::Connection;
use super::engine::{Engine, RawStatement};
use super::error::{MySqlError, MySqlResult};
use super::fetch::ResultFetcher;
use super::types::Value;
use crate::executor::QueryResult;

/// A statement prepared on a borrowed connection.
///
/// Once released (explicitly, after an execute failure, or after its result
/// set has been fetched) every further `execute` fails with
/// [`MySqlError::StatementReleased`].
pub struct PreparedStatement<'conn> {
    conn: &'conn Connection,
    /// Native statement (None once released)
    handle: Option<RawStatement>,
    sql: String,
    params: BindSet,
    /// Parameter count of the previous execution, if any
    bound_count: Option<usize>,
}

impl<'conn> PreparedStatement<'conn> {
    /// Prepare `sql` on a live connection.
    pub(crate) fn prepare(sql: &str, conn: &'conn Connection) -> MySqlResult<Self> {
        let raw = conn.raw()?;
        let engine = conn.engine();

        let stmt = engine
            .statement_init(raw)
            .map_err(|e| MySqlError::execute("prepare", e))?;

        if let Err(e) = engine.prepare(stmt, sql) {
            engine.close_statement(stmt);
            return Err(MySqlError::execute("prepare", e));
        }

        Ok(Self {
            conn,
            handle: Some(stmt),
            sql: sql.to_string(),
            params: BindSet::new(),
            bound_count: None,
        })
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }

    /// Parameter slots bound by the last execution.
    pub fn params(&self) -> &BindSet {
        &self.params
    }

    pub(crate) fn raw(&self) -> MySqlResult<RawStatement> {
        self.handle.ok_or(MySqlError::StatementReleased)
    }

    pub(crate) fn engine(&self) -> &'conn dyn Engine {
        let conn: &'conn Connection = self.conn;
        conn.engine()
    }

    /// Bind `params` (if given), execute, and collect any result rows.
    ///
    /// Parameters passed to a statement that has executed before must have
    /// the same count as the previous call. `None` re-executes with the
    /// current bindings.
    pub fn execute(&mut self, params: Option<&[Value]>) -> MySqlResult<QueryResult> {
        let stmt = self.raw()?;
        let engine = self.engine();

        if let Some(params) = params {
            if let Some(expected) = self.bound_count {
                if expected != params.len() {
                    return Err(MySqlError::ShapeMismatch {
                        expected,
                        actual: params.len(),
                    });
                }
            }
            self.params.bind_params(params);
            self.bound_count = Some(params.len());
        }

        if let Err(e) = engine.bind_execute(stmt, &self.params) {
            tracing::debug!(sql = %self.sql, error = %e, "execute failed, releasing statement");
            self.release();
            return Err(MySqlError::execute("execute", e));
        }

        match engine.result_metadata(stmt) {
            None => Ok(QueryResult::statement(engine.affected_rows(stmt))),
            Some(columns) => ResultFetcher::prepare_result_decoding(columns).fetch_execute_and_iterate(self),
        }
    }

    /// Free parameter buffers and the native statement. Safe to call more
    /// than once.
    pub fn release(&mut self) {
        if let Some(stmt) = self.handle.take() {
            self.engine().close_statement(stmt);
        }
        self.params.release();
    }
}

impl Drop for PreparedStatement<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PreparedStatement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("sql", &self.sql)
            .field("handle", &self.handle)
            .field("bound_count", &self.bound_count)
            .finish()
    }
}
