//! MySQL-style driver core.
//!
//! This module provides a synchronous driver pipeline that:
//! - Pools connections with bounded growth and a wait timeout
//! - Binds parameters in the binary protocol layouts
//! - Decodes result rows through the same type codec
//!
//! Architecture:
//! - `engine`: The client library seam (connect/prepare/execute/fetch)
//! - `types`: Wire type tags, values and binary encoding/decoding
//! - `bind`: Growable buffers backing parameters and result rows
//! - `connection`: Settings, connection lifecycle and transactions
//! - `statement`: Prepared statement bind/execute orchestration
//! - `fetch`: Result-set decoding state machine
//! - `pool`: Connection pool with FIFO checkout and growth

pub mod engine;
pub mod types;
pub mod bind;
pub mod connection;
pub mod statement;
pub mod fetch;
pub mod pool;
pub mod error;

#[cfg(test)]
pub(crate) mod test_engine;

pub use bind::{BindSet, BindSlot};
pub use connection::{Connection, Settings, TransactionState};
pub use engine::{Engine, EngineResult, FetchStatus, RawConnection, RawStatement};
pub use error::{EngineError, MySqlError, MySqlResult};
pub use fetch::{FetchState, ResultFetcher};
pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection, TransactionReleasePolicy};
pub use statement::PreparedStatement;
pub use types::{Column, FieldType, TimeRecord, Value};
