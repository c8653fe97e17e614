//! Error types for the mysqlkit facade.

use thiserror::Error;

use crate::mysql::MySqlError;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Query execution error: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error(transparent)]
    Driver(MySqlError),
}

impl From<MySqlError> for DbError {
    fn from(err: MySqlError) -> DbError {
        match err {
            MySqlError::Connect(_) => DbError::ConnectionError(err.to_string()),
            MySqlError::Execute { .. }
            | MySqlError::Type(_)
            | MySqlError::RowCount { .. }
            | MySqlError::StatementReleased => {
                DbError::QueryError(err.to_string())
            }
            MySqlError::StateConflict { .. } => DbError::TransactionError(err.to_string()),
            MySqlError::Config(_) => DbError::ConfigError(err.to_string()),
            other => DbError::Driver(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
