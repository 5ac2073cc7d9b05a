//! Database access layer.
//!
//! This module provides:
//! - The driver seam and the process-wide database installation
//! - A sqlx-backed driver for SQLite, PostgreSQL and MySQL
//! - Lazily opened connection handles and per-execution-unit contexts
//! - Nestable connection and transaction scopes
//! - Query helpers and INSERT / UPDATE builders
//! - Type mappings and dispatch macros for the sqlx backends

pub mod connector;
pub mod context;
pub mod driver;
pub mod executor;
pub mod handle;
#[macro_use]
pub mod macros;
#[cfg(test)]
pub(crate) mod mock;
pub mod params;
pub mod scope;
pub mod statement;
pub mod types;

pub use connector::{SqlxConnection, SqlxConnector};
pub use context::ExecutionContext;
pub use driver::{Cursor, Database, DriverFactory, RawConnection, install, is_installed};
pub use executor::SLOW_QUERY_THRESHOLD;
pub use handle::ConnectionHandle;
pub use scope::{ConnectionScope, TransactionScope};
pub use statement::{Insert, Update};

use crate::config::DatabaseConfig;
use crate::error::DbResult;

/// Install the sqlx-backed driver for `config` process-wide.
///
/// No connection is opened here; the first scope does that. Fails with
/// [`crate::DbError::AlreadyInitialized`] on a second call.
pub fn init(config: &DatabaseConfig) -> DbResult<()> {
    install(SqlxConnector::new(config.clone()).into_database())
}
