//! Per-execution-unit connection state.
//!
//! An [`ExecutionContext`] belongs to exactly one thread or task. It is handed
//! around explicitly (`&mut ExecutionContext`), so two units can never observe
//! the same connection or transaction depth; no locking is involved.

use crate::db::driver::{self, Cursor, Database};
use crate::db::handle::ConnectionHandle;
use crate::db::scope::{ConnectionScope, TransactionScope};
use crate::error::{DbError, DbResult};
use crate::models::PlaceholderStyle;
use std::sync::Arc;
use tracing::debug;

/// Connection handle and transaction depth for one unit of work.
///
/// Invariant: `transactions > 0` implies a handle is held.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    /// Explicitly injected database; `None` defers to the process-wide one.
    database: Option<Arc<Database>>,
    connection: Option<ConnectionHandle>,
    transactions: usize,
}

impl ExecutionContext {
    /// Create a context bound to the process-wide database.
    ///
    /// The lookup is deferred until a scope first needs a connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context bound to a specific database.
    pub fn with_database(database: Arc<Database>) -> Self {
        Self {
            database: Some(database),
            ..Self::default()
        }
    }

    fn resolve_database(&self) -> Arc<Database> {
        self.database.clone().unwrap_or_else(driver::installed)
    }

    /// Placeholder style statements are rewritten into before execution.
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        match (&self.connection, &self.database) {
            (Some(handle), _) => handle.database().placeholder(),
            (None, Some(database)) => database.placeholder(),
            (None, None) => driver::installed().placeholder(),
        }
    }

    /// True iff a connection handle is currently held.
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Current transaction nesting depth; 0 means no transaction is open.
    pub fn transaction_depth(&self) -> usize {
        self.transactions
    }

    /// Whether a physical connection has actually been opened.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(ConnectionHandle::is_open)
    }

    /// Create a fresh lazy handle and reset the transaction depth.
    ///
    /// Fails if a handle is already held; check [`is_initialized`](Self::is_initialized) first.
    pub fn init(&mut self) -> DbResult<()> {
        if self.connection.is_some() {
            return Err(DbError::internal("execution context is already initialized"));
        }
        debug!("open lazy connection...");
        self.connection = Some(ConnectionHandle::new(self.resolve_database()));
        self.transactions = 0;
        Ok(())
    }

    /// Release the held handle, closing its physical connection.
    ///
    /// Fails while a transaction is open; the handle is kept in that case.
    pub fn cleanup(&mut self) -> DbResult<()> {
        if self.transactions > 0 {
            return Err(DbError::internal("cleanup inside an open transaction"));
        }
        match self.connection.take() {
            Some(mut handle) => handle.cleanup(),
            None => Ok(()),
        }
    }

    /// Cursor on the held handle, opening the physical connection on first use.
    pub fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        self.connection
            .as_mut()
            .ok_or(DbError::NotInitialized)?
            .acquire_cursor()
    }

    pub(crate) fn commit(&mut self) -> DbResult<()> {
        self.connection
            .as_mut()
            .ok_or(DbError::NoConnection)?
            .commit()
    }

    pub(crate) fn rollback(&mut self) -> DbResult<()> {
        self.connection
            .as_mut()
            .ok_or(DbError::NoConnection)?
            .rollback()
    }

    pub(crate) fn begin_transaction(&mut self) -> usize {
        self.transactions += 1;
        self.transactions
    }

    pub(crate) fn end_transaction(&mut self) -> usize {
        self.transactions = self.transactions.saturating_sub(1);
        self.transactions
    }

    /// Enter a connection scope on this context.
    pub fn connection(&mut self) -> DbResult<ConnectionScope<'_>> {
        ConnectionScope::enter(self)
    }

    /// Enter a transaction scope on this context.
    pub fn transaction(&mut self) -> DbResult<TransactionScope<'_>> {
        TransactionScope::enter(self)
    }
}
