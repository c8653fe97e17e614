//! Pool-backed execution facade.
//!
//! `Database` wraps acquire + execute + release into single calls, so the
//! connection goes back to the pool on every path.

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::executor::QueryResult;
use crate::mysql::{ConnectionPool, Engine, PoolConfig, PoolStatus, PooledConnection, Settings, Value};

/// A database handle backed by a connection pool.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create the pool and stock its initial connections.
    pub fn connect(engine: Arc<dyn Engine>, settings: Settings, config: PoolConfig) -> Result<Self> {
        let pool = ConnectionPool::new(engine, settings, config)?;
        Ok(Self { pool })
    }

    /// Connect using a `mysql://` URL.
    pub fn connect_url(engine: Arc<dyn Engine>, url: &str, config: PoolConfig) -> Result<Self> {
        let settings = Settings::from_url(url)?;
        Self::connect(engine, settings, config)
    }

    /// Execute a raw SQL statement.
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        let mut conn = self.pool.get()?;
        Ok(conn.execute(sql)?)
    }

    /// Execute a parameterized SQL statement.
    pub fn execute_with(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut conn = self.pool.get()?;
        Ok(conn.execute_with(sql, params)?)
    }

    /// Run `f` inside a transaction on one pooled connection.
    ///
    /// Commits when `f` succeeds and rolls back when it fails. A failed
    /// rollback is logged and the original error returned.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PooledConnection) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        conn.start_transaction()?;

        match f(&mut conn) {
            Ok(value) => {
                conn.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = conn.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed transaction body failed");
                }
                Err(e)
            }
        }
    }

    /// Check out a connection for several calls.
    pub fn connection(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(DbError::from)
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Close all connections.
    pub fn close(&self) {
        self.pool.shutdown();
    }
}
