//! Error types for the MySQL driver core.

use thiserror::Error;

/// Result type for driver operations.
pub type MySqlResult<T> = Result<T, MySqlError>;

/// An error reported by the engine client library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({code})")]
pub struct EngineError {
    /// Engine error number (0 when the engine gave none)
    pub code: u32,
    /// Engine error text
    pub message: String,
}

impl EngineError {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Errors surfaced by connections, statements and the pool.
#[derive(Error, Debug)]
pub enum MySqlError {
    /// Engine-level connect error, or no pool slot became available in time.
    #[error("Connect failed: {0}")]
    Connect(String),

    /// The engine rejected a prepare/bind/execute/fetch call.
    #[error("Execute failed during {context}: {source}")]
    Execute {
        context: &'static str,
        #[source]
        source: EngineError,
    },

    /// Parameter count differs from the previous execution of the statement.
    #[error("Parameter count mismatch: statement was bound with {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Transaction verb invoked in the wrong state.
    #[error("Cannot {operation}: transaction is {state}")]
    StateConflict {
        operation: &'static str,
        state: &'static str,
    },

    /// A single-row accessor found a different number of rows.
    #[error("Expected {expected} row, got {actual}")]
    RowCount { expected: &'static str, actual: usize },

    /// The statement has already been released.
    #[error("Statement has been released")]
    StatementReleased,

    /// The connection has no live engine handle.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// A result buffer could not be decoded for its column type.
    #[error("Type error: {0}")]
    Type(String),

    /// Invalid settings or pool configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MySqlError {
    pub(crate) fn execute(context: &'static str, source: EngineError) -> Self {
        MySqlError::Execute { context, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_error_carries_engine_text() {
        let err = MySqlError::execute("prepare", EngineError::new(1064, "syntax error near 'SELEC'"));
        let msg = err.to_string();
        assert!(msg.contains("prepare"));
        assert!(msg.contains("syntax error near 'SELEC'"));
        assert!(msg.contains("1064"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = MySqlError::ShapeMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Parameter count mismatch: statement was bound with 2, got 3"
        );
    }
}
