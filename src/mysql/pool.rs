//! MySQL connection pool.
//!
//! Connections are handed out FIFO from an idle queue. A counting
//! availability primitive tracks "idle + not yet created but allowed" slots;
//! callers block on it up to the configured timeout. When an acquisition
//! drains the last idle connection and the pool is below its maximum, the
//! pool grows by one connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Deserializer};

use super::connection::{Connection, Settings, TransactionState};
use super::engine::{ensure_initialized, Engine};
use super::error::{MySqlError, MySqlResult};
use super::types::Value;
use crate::executor::QueryResult;

// ============================================================================
// Pool Configuration
// ============================================================================

/// What to do with a connection released while its transaction is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReleasePolicy {
    /// Roll the transaction back before the connection becomes idle.
    #[default]
    Rollback,
    /// Close the connection; the next acquirer gets a fresh replacement.
    Discard,
    /// Keep the open transaction for the next acquirer.
    Retain,
}

fn default_initial_size() -> usize {
    1
}

fn default_max_size() -> usize {
    10
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(10)
}

fn deserialize_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Connections created up front
    #[serde(default = "default_initial_size", alias = "initialPoolSize")]
    pub initial_size: usize,
    /// Upper bound on pool capacity
    #[serde(default = "default_max_size", alias = "maxPoolSize")]
    pub max_size: usize,
    /// How long `acquire` waits for a connection
    #[serde(
        default = "default_acquire_timeout",
        rename = "acquireTimeoutSecs",
        deserialize_with = "deserialize_secs"
    )]
    pub acquire_timeout: Duration,
    /// Handling of connections released mid-transaction
    #[serde(default)]
    pub release_policy: TransactionReleasePolicy,
}

impl PoolConfig {
    pub fn new() -> Self {
        Self {
            initial_size: default_initial_size(),
            max_size: default_max_size(),
            acquire_timeout: default_acquire_timeout(),
            release_policy: TransactionReleasePolicy::default(),
        }
    }

    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> MySqlResult<Self> {
        serde_json::from_str(json).map_err(|e| MySqlError::Config(e.to_string()))
    }

    /// Set the number of connections created up front.
    pub fn initial_size(mut self, size: usize) -> Self {
        self.initial_size = size;
        self
    }

    /// Set the maximum number of connections.
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set how long `acquire` waits before giving up.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn release_policy(mut self, policy: TransactionReleasePolicy) -> Self {
        self.release_policy = policy;
        self
    }

    /// Clamp sizes: both at least one, and the maximum never below the
    /// initial size.
    pub fn normalized(mut self) -> Self {
        self.initial_size = self.initial_size.max(1);
        self.max_size = self.max_size.max(self.initial_size);
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Availability
// ============================================================================

struct Permits {
    available: usize,
    closed: bool,
}

/// Counting primitive: one permit per idle or creatable connection.
struct Availability {
    permits: Mutex<Permits>,
    cond: Condvar,
}

impl Availability {
    fn new(available: usize) -> Self {
        Self {
            permits: Mutex::new(Permits {
                available,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Take one permit, waiting up to `timeout`.
    ///
    /// A timeout too large to express as a deadline waits indefinitely.
    fn acquire(&self, timeout: Duration) -> bool {
        let mut permits = self.permits.lock();
        if permits.available == 0 && !permits.closed {
            match Instant::now().checked_add(timeout) {
                Some(deadline) => {
                    while permits.available == 0 && !permits.closed {
                        if self.cond.wait_until(&mut permits, deadline).timed_out() {
                            break;
                        }
                    }
                }
                None => {
                    while permits.available == 0 && !permits.closed {
                        self.cond.wait(&mut permits);
                    }
                }
            }
        }
        if permits.closed || permits.available == 0 {
            return false;
        }
        permits.available -= 1;
        true
    }

    fn add(&self, n: usize) {
        let mut permits = self.permits.lock();
        permits.available += n;
        for _ in 0..n {
            self.cond.notify_one();
        }
    }

    fn close(&self) {
        self.permits.lock().closed = true;
        self.cond.notify_all();
    }

    fn available(&self) -> usize {
        self.permits.lock().available
    }
}

// ============================================================================
// Pool Inner
// ============================================================================

/// Snapshot of pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub checked_out: usize,
    pub capacity: usize,
    pub max: usize,
}

struct PoolState {
    /// Idle connections, oldest first
    idle: VecDeque<Connection>,
    capacity: usize,
    checked_out: usize,
    closed: bool,
}

/// Internal pool state.
struct PoolInner {
    engine: Arc<dyn Engine>,
    settings: Arc<Settings>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    availability: Availability,
}

impl PoolInner {
    fn create_connection(&self) -> MySqlResult<Connection> {
        Connection::connect(Arc::clone(&self.engine), Arc::clone(&self.settings))
    }

    /// Swap a dead connection for a new one with the same settings.
    fn replace(&self, dead: Connection) -> Connection {
        let engine = dead.shared_engine();
        let settings = dead.shared_settings();
        drop(dead);
        match Connection::connect(Arc::clone(&engine), Arc::clone(&settings)) {
            Ok(conn) => {
                tracing::debug!("replaced dead pooled connection");
                conn
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to replace dead pooled connection");
                Connection::disconnected(engine, settings)
            }
        }
    }
}

// ============================================================================
// Connection Pool
// ============================================================================

/// A bounded, growable pool of connections.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Create a pool stocked with `initial_size` connections.
    ///
    /// Fails if any initial connection cannot be established.
    pub fn new(engine: Arc<dyn Engine>, settings: Settings, config: PoolConfig) -> MySqlResult<Self> {
        let config = config.normalized();
        ensure_initialized(engine.as_ref()).map_err(|e| MySqlError::Connect(e.to_string()))?;

        let inner = PoolInner {
            engine,
            settings: Arc::new(settings),
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(config.max_size),
                capacity: config.initial_size,
                checked_out: 0,
                closed: false,
            }),
            availability: Availability::new(config.initial_size),
            config,
        };

        // Pre-create initial connections
        let mut idle = VecDeque::with_capacity(inner.config.max_size);
        for _ in 0..inner.config.initial_size {
            idle.push_back(inner.create_connection()?);
        }
        inner.state.lock().idle = idle;

        tracing::debug!(
            initial = inner.config.initial_size,
            max = inner.config.max_size,
            "connection pool ready"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Check out a connection, waiting up to the configured timeout.
    ///
    /// Returns `None` on timeout or after shutdown. Every connection returned
    /// here must be passed back to [`ConnectionPool::release`].
    pub fn acquire(&self) -> Option<Connection> {
        let inner = &self.inner;
        if !inner.availability.acquire(inner.config.acquire_timeout) {
            tracing::debug!(timeout = ?inner.config.acquire_timeout, "timed out waiting for a connection");
            return None;
        }

        let mut state = inner.state.lock();
        let Some(mut conn) = state.idle.pop_front() else {
            tracing::error!("availability granted but no idle connection was queued");
            return None;
        };

        if !conn.is_live() {
            conn = inner.replace(conn);
        }

        if state.idle.is_empty() && state.capacity < inner.config.max_size {
            match inner.create_connection() {
                Ok(extra) => {
                    state.idle.push_back(extra);
                    state.capacity += 1;
                    inner.availability.add(1);
                    tracing::debug!(capacity = state.capacity, "connection pool grew");
                }
                Err(e) => tracing::warn!(error = %e, "connection pool failed to grow"),
            }
        }

        state.checked_out += 1;
        Some(conn)
    }

    /// Return a checked-out connection to the idle queue.
    pub fn release(&self, mut conn: Connection) {
        if conn.in_transaction() {
            self.settle_transaction(&mut conn);
        }

        let mut state = self.inner.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
        if state.closed {
            drop(state);
            conn.close();
            return;
        }
        state.idle.push_back(conn);
        self.inner.availability.add(1);
    }

    fn settle_transaction(&self, conn: &mut Connection) {
        match self.inner.config.release_policy {
            TransactionReleasePolicy::Rollback => {
                if let Err(e) = conn.rollback() {
                    tracing::warn!(error = %e, "rollback on release failed, closing connection");
                    conn.close();
                }
            }
            TransactionReleasePolicy::Discard => {
                tracing::debug!("discarding connection released mid-transaction");
                conn.close();
            }
            TransactionReleasePolicy::Retain => {
                tracing::warn!(
                    state = TransactionState::Active.as_str(),
                    "connection returned to pool with an open transaction"
                );
            }
        }
    }

    /// Check out a connection that is released when dropped.
    pub fn get(&self) -> MySqlResult<PooledConnection> {
        let conn = self.acquire().ok_or_else(|| {
            MySqlError::Connect(format!(
                "no connection available within {:?}",
                self.inner.config.acquire_timeout
            ))
        })?;
        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.clone(),
        })
    }

    /// Close every idle connection and stop handing out new ones.
    ///
    /// Connections still checked out are closed when released. Idempotent.
    pub fn shutdown(&self) {
        let connections = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.availability.close();

        let closed = connections.len();
        for mut conn in connections {
            conn.close();
        }
        if closed > 0 {
            tracing::debug!(closed, "connection pool shut down");
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            checked_out: state.checked_out,
            capacity: state.capacity,
            max: self.inner.config.max_size,
        }
    }

    /// Slots a caller could take right now without waiting.
    pub fn available(&self) -> usize {
        self.inner.availability.available()
    }

    /// Get the pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }
}

// ============================================================================
// Pooled Connection
// ============================================================================

/// A connection checked out from the pool.
///
/// When dropped, the connection is returned to the pool.
pub struct PooledConnection {
    /// The actual connection (None when returned to pool)
    conn: Option<Connection>,
    pool: ConnectionPool,
}

impl PooledConnection {
    fn conn_mut(&mut self) -> MySqlResult<&mut Connection> {
        self.conn.as_mut().ok_or(MySqlError::ConnectionClosed)
    }

    /// Execute a statement without parameters.
    pub fn execute(&mut self, sql: &str) -> MySqlResult<QueryResult> {
        self.conn_mut()?.execute(sql)
    }

    /// Execute a parameterized statement.
    pub fn execute_with(&mut self, sql: &str, params: &[Value]) -> MySqlResult<QueryResult> {
        self.conn_mut()?.execute_with(sql, params)
    }

    /// Begin a transaction.
    pub fn start_transaction(&mut self) -> MySqlResult<()> {
        self.conn_mut()?.start_transaction()
    }

    /// Commit the transaction.
    pub fn commit(&mut self) -> MySqlResult<()> {
        self.conn_mut()?.commit()
    }

    /// Rollback the transaction.
    pub fn rollback(&mut self) -> MySqlResult<()> {
        self.conn_mut()?.rollback()
    }

    pub fn in_transaction(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::in_transaction)
    }

    /// Check if the connection is live.
    pub fn is_live(&self) -> bool {
        self.conn.as_ref().is_some_and(Connection::is_live)
    }

    /// Borrow the underlying connection.
    pub fn connection(&mut self) -> MySqlResult<&mut Connection> {
        self.conn_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
