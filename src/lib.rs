//! dbctx library
//!
//! A small data-access layer over raw SQL drivers (SQLite, PostgreSQL, MySQL):
//! lazily opened per-execution-unit connections, nestable connection and
//! transaction scopes where only the outermost boundary has effect, and a
//! handful of query helpers returning name-keyed records.

pub mod config;
pub mod db;
pub mod error;
pub mod id;
pub mod models;

pub use config::{Config, DatabaseConfig};
pub use db::{
    ConnectionScope, Database, ExecutionContext, Insert, TransactionScope, Update, init, install,
};
pub use error::{DbError, DbResult};
pub use id::next_id;
pub use models::{DatabaseType, PlaceholderStyle, Record, Value};
