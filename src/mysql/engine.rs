//! The engine client library seam.
//!
//! The driver core never speaks the wire protocol itself. Everything below
//! prepare/bind/execute/fetch is delegated to an [`Engine`], which hands out
//! opaque tokens for native connections and statements.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::bind::BindSet;
use super::connection::Settings;
use super::error::EngineError;
use super::types::Column;

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Opaque native connection token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawConnection(pub u64);

/// Opaque native statement token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawStatement(pub u64);

/// Outcome of fetching one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// A row was written into the result slots.
    Row,
    /// A row was written but at least one column did not fit its buffer.
    Truncated,
    /// No more rows.
    NoData,
    /// The fetch failed.
    Error(EngineError),
}

/// Primitives provided by the engine client library.
///
/// Implementations must be safe to share across threads; the driver
/// guarantees a given `RawConnection` (and its statements) is only used by
/// one thread at a time.
pub trait Engine: Send + Sync {
    /// One-time process setup of the client library.
    fn library_init(&self) -> EngineResult<()> {
        Ok(())
    }

    /// Matching teardown for [`Engine::library_init`].
    fn library_end(&self) {}

    /// Open a native connection.
    fn connect(&self, settings: &Settings) -> EngineResult<RawConnection>;

    /// Apply the client character set.
    fn set_character_set(&self, conn: RawConnection, charset: &str) -> EngineResult<()>;

    /// Close a native connection.
    fn close(&self, conn: RawConnection);

    fn autocommit(&self, conn: RawConnection, enabled: bool) -> EngineResult<()>;

    fn commit(&self, conn: RawConnection) -> EngineResult<()>;

    fn rollback(&self, conn: RawConnection) -> EngineResult<()>;

    /// Allocate a native statement on a connection.
    fn statement_init(&self, conn: RawConnection) -> EngineResult<RawStatement>;

    /// Prepare statement text on an allocated statement.
    ///
    /// On failure the statement stays allocated and must still be closed.
    fn prepare(&self, stmt: RawStatement, sql: &str) -> EngineResult<()>;

    /// Bind the parameter slots and execute.
    fn bind_execute(&self, stmt: RawStatement, params: &BindSet) -> EngineResult<()>;

    /// Result-set column metadata, `None` for statements without rows.
    fn result_metadata(&self, stmt: RawStatement) -> Option<Vec<Column>>;

    /// Rows changed by the last execution of a non-query statement.
    fn affected_rows(&self, stmt: RawStatement) -> u64;

    /// Bind the result slots and (re-)execute so rows can be fetched.
    fn bind_result_execute(&self, stmt: RawStatement, row: &mut BindSet) -> EngineResult<()>;

    /// Fetch the next row into the bound result slots.
    fn fetch(&self, stmt: RawStatement, row: &mut BindSet) -> FetchStatus;

    /// Free a native statement.
    fn close_statement(&self, stmt: RawStatement);
}

// ============================================================================
// Library Initialization
// ============================================================================

/// Process-wide client library state.
static LIBRARY_READY: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Initialize the client library once per process.
///
/// Subsequent calls are no-ops until [`teardown`] runs. Only one engine
/// implementation is expected per process.
pub fn ensure_initialized(engine: &dyn Engine) -> EngineResult<()> {
    let mut ready = LIBRARY_READY.lock();
    if !*ready {
        engine.library_init()?;
        tracing::debug!("engine client library initialized");
        *ready = true;
    }
    Ok(())
}

/// Release process-wide client library state, if initialized.
pub fn teardown(engine: &dyn Engine) {
    let mut ready = LIBRARY_READY.lock();
    if *ready {
        engine.library_end();
        tracing::debug!("engine client library torn down");
        *ready = false;
    }
}

/// Check whether the client library is currently initialized.
pub fn is_initialized() -> bool {
    *LIBRARY_READY.lock()
}
