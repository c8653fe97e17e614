//! mysqlkit - a synchronous MySQL-style driver core.
//!
//! A bounded connection pool feeds a prepared-statement layer that encodes
//! parameters into binary layouts and decodes result rows back into typed
//! values. The wire protocol itself is provided by a [`mysql::Engine`]
//! implementation.

mod error;
mod executor;
pub mod mysql;
mod pool;

pub use error::{DbError, Result};
pub use executor::{QueryResult, ResultKind, Row, RowValues, SharedColumns};
pub use mysql::{
    Column, Connection, ConnectionPool, Engine, FieldType, PoolConfig, PoolStatus,
    PooledConnection, Settings, TransactionReleasePolicy, Value,
};
pub use pool::Database;
