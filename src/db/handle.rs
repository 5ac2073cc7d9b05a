//! Lazily opened connection handle.

use crate::db::driver::{Cursor, Database, RawConnection};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::debug;

/// Owns at most one raw connection, opened on the first cursor request.
pub struct ConnectionHandle {
    database: Arc<Database>,
    connection: Option<Box<dyn RawConnection>>,
}

impl ConnectionHandle {
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            connection: None,
        }
    }

    /// Whether a physical connection has been opened.
    pub fn is_open(&self) -> bool {
        self.connection.is_some()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Return a new cursor, opening the physical connection if needed.
    pub fn acquire_cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>> {
        if self.connection.is_none() {
            debug!(database = %self.database.label(), "open connection...");
            self.connection = Some(self.database.connect()?);
        }
        self.connection
            .as_mut()
            .ok_or(DbError::NoConnection)?
            .cursor()
    }

    pub fn commit(&mut self) -> DbResult<()> {
        self.connection
            .as_mut()
            .ok_or(DbError::NoConnection)?
            .commit()
    }

    pub fn rollback(&mut self) -> DbResult<()> {
        self.connection
            .as_mut()
            .ok_or(DbError::NoConnection)?
            .rollback()
    }

    /// Close the physical connection if one is open. Calling it again is a no-op.
    pub fn cleanup(&mut self) -> DbResult<()> {
        match self.connection.take() {
            Some(connection) => {
                debug!(database = %self.database.label(), "close connection...");
                connection.close()
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("database", &self.database.label())
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MockDriver;

    #[test]
    fn test_connection_opens_lazily_once() {
        let driver = MockDriver::new();
        let mut handle = ConnectionHandle::new(driver.database());
        assert!(!handle.is_open());
        assert_eq!(driver.stats().connects, 0);

        handle.acquire_cursor().unwrap();
        handle.acquire_cursor().unwrap();
        assert!(handle.is_open());
        assert_eq!(driver.stats().connects, 1);
    }

    #[test]
    fn test_commit_without_connection_fails() {
        let driver = MockDriver::new();
        let mut handle = ConnectionHandle::new(driver.database());
        assert!(matches!(handle.commit(), Err(DbError::NoConnection)));
        assert!(matches!(handle.rollback(), Err(DbError::NoConnection)));
    }

    #[test]
    fn test_commit_and_rollback_pass_through() {
        let driver = MockDriver::new();
        let mut handle = ConnectionHandle::new(driver.database());
        handle.acquire_cursor().unwrap();
        handle.commit().unwrap();
        handle.rollback().unwrap();
        let stats = driver.stats();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.rollbacks, 1);
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let driver = MockDriver::new();
        let mut handle = ConnectionHandle::new(driver.database());
        handle.cleanup().unwrap();
        handle.acquire_cursor().unwrap();
        handle.cleanup().unwrap();
        handle.cleanup().unwrap();
        assert!(!handle.is_open());
        assert_eq!(driver.stats().closes, 1);
    }

    #[test]
    fn test_connect_failure_leaves_handle_closed() {
        let driver = MockDriver::new().failing_connect();
        let mut handle = ConnectionHandle::new(driver.database());
        assert!(handle.acquire_cursor().is_err());
        assert!(!handle.is_open());
    }
}
