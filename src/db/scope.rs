//! Nestable connection and transaction scopes.
//!
//! Both scope types are guards borrowed from an [`ExecutionContext`]. They
//! dereference to the context, so nested scopes and queries are opened
//! through the guard:
//!
//! ```no_run
//! # use dbctx::{ExecutionContext, DbResult};
//! # fn demo(ctx: &mut ExecutionContext) -> DbResult<()> {
//! let mut conn = ctx.connection()?;
//! let mut tx = conn.transaction()?;
//! tx.execute("update account set balance = balance - ? where id = ?", &[10.into(), 1.into()])?;
//! {
//!     let mut inner = tx.transaction()?; // joins the outer transaction
//!     inner.execute("update account set balance = balance + ? where id = ?", &[10.into(), 2.into()])?;
//!     inner.complete()?; // no commit here
//! }
//! tx.complete()?; // commits both updates
//! # Ok(())
//! # }
//! ```
//!
//! Only the outermost instance of either kind has an effect on exit: the
//! outermost connection scope closes the connection, the transaction scope
//! that brings the depth back to zero commits or rolls back.

use crate::db::context::ExecutionContext;
use crate::error::{DbError, DbResult};
use std::ops::{Deref, DerefMut};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Keeps the context's connection handle alive for the guard's lifetime.
pub struct ConnectionScope<'a> {
    ctx: &'a mut ExecutionContext,
    outer: bool,
}

impl<'a> ConnectionScope<'a> {
    /// Join the context's handle, creating one if none exists.
    pub fn enter(ctx: &'a mut ExecutionContext) -> DbResult<Self> {
        let outer = !ctx.is_initialized();
        if outer {
            ctx.init()?;
        }
        Ok(Self { ctx, outer })
    }

    /// Whether this scope created the handle and will release it.
    pub fn is_outer(&self) -> bool {
        self.outer
    }

    /// Exit the scope, reporting a failure to close the connection.
    ///
    /// Dropping the guard does the same but can only log such a failure.
    pub fn close(mut self) -> DbResult<()> {
        if std::mem::take(&mut self.outer) {
            self.ctx.cleanup()
        } else {
            Ok(())
        }
    }
}

impl Deref for ConnectionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.ctx
    }
}

impl DerefMut for ConnectionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.ctx
    }
}

impl Drop for ConnectionScope<'_> {
    fn drop(&mut self) {
        if self.outer {
            if let Err(e) = self.ctx.cleanup() {
                warn!(error = %e, "Failed to close connection");
            }
        }
    }
}

/// One level of transaction nesting.
///
/// Finish with [`complete`](Self::complete) on success. Dropping the guard
/// any other way (early `?` return, panic, [`abort`](Self::abort)) counts as
/// a failed exit and rolls back once the depth reaches zero.
pub struct TransactionScope<'a> {
    ctx: &'a mut ExecutionContext,
    owns_connection: bool,
    finished: bool,
}

impl<'a> TransactionScope<'a> {
    pub fn enter(ctx: &'a mut ExecutionContext) -> DbResult<Self> {
        let owns_connection = !ctx.is_initialized();
        if owns_connection {
            ctx.init()?;
        }
        if ctx.begin_transaction() == 1 {
            debug!("begin transaction...");
        } else {
            debug!("join current transaction...");
        }
        Ok(Self {
            ctx,
            owns_connection,
            finished: false,
        })
    }

    /// Whether this scope opened its own connection handle.
    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    /// Successful exit: commits if this is the outermost transaction.
    pub fn complete(mut self) -> DbResult<()> {
        self.exit(false)
    }

    /// Failed exit: rolls back if this is the outermost transaction.
    pub fn abort(mut self) -> DbResult<()> {
        self.exit(true)
    }

    fn exit(&mut self, failed: bool) -> DbResult<()> {
        self.finished = true;
        let depth = self.ctx.end_transaction();
        let outcome = if depth > 0 {
            Ok(())
        } else if !self.ctx.is_connected() {
            // The lazy connection was never opened: nothing to decide.
            debug!("transaction ran no statements");
            Ok(())
        } else if failed {
            self.rollback()
        } else {
            self.commit()
        };
        let cleanup = if self.owns_connection {
            self.ctx.cleanup()
        } else {
            Ok(())
        };
        outcome.and(cleanup)
    }

    /// Commit; on failure attempt a rollback, then return the commit error.
    fn commit(&mut self) -> DbResult<()> {
        debug!("commit transaction...");
        match self.ctx.commit() {
            Ok(()) => {
                debug!("commit ok.");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "commit failed. try rollback...");
                match self.ctx.rollback() {
                    Ok(()) => warn!("rollback ok."),
                    Err(rollback_err) => {
                        warn!(error = %rollback_err, "rollback after failed commit also failed")
                    }
                }
                Err(err)
            }
        }
    }

    fn rollback(&mut self) -> DbResult<()> {
        debug!("rollback transaction...");
        self.ctx.rollback()?;
        info!("rollback ok.");
        Ok(())
    }
}

impl Deref for TransactionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        self.ctx
    }
}

impl DerefMut for TransactionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        self.ctx
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.exit(true) {
                warn!(error = %e, "Failed to roll back abandoned transaction");
            }
        }
    }
}

impl ExecutionContext {
    /// Run `f` inside a connection scope.
    pub fn with_connection<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ExecutionContext) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut scope = ConnectionScope::enter(self)?;
        f(&mut *scope)
    }

    /// Run `f` inside a transaction scope.
    ///
    /// `Ok` completes the scope (committing at the outermost level); `Err`
    /// or a panic rolls back. The closure's error is returned unchanged even
    /// if the rollback itself fails.
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut ExecutionContext) -> Result<T, E>,
        E: From<DbError>,
    {
        let start = Instant::now();
        let mut scope = TransactionScope::enter(self)?;
        match f(&mut *scope) {
            Ok(value) => {
                scope.complete()?;
                crate::db::executor::profile(start, "transaction");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scope.abort() {
                    warn!(error = %rollback_err, "Rollback after failed transaction body failed");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{Event, MockDriver};
    use crate::models::Value;

    fn context(driver: &MockDriver) -> ExecutionContext {
        ExecutionContext::with_database(driver.database())
    }

    fn nest_connections(ctx: &mut ExecutionContext, depth: usize, outer: bool) -> DbResult<()> {
        let mut scope = ConnectionScope::enter(ctx)?;
        assert_eq!(scope.is_outer(), outer);
        scope.cursor()?;
        if depth > 1 {
            nest_connections(&mut scope, depth - 1, false)?;
        }
        Ok(())
    }

    #[test]
    fn test_nested_connection_scopes_share_one_connection() {
        for depth in 1..=5 {
            let driver = MockDriver::new();
            let mut ctx = context(&driver);
            nest_connections(&mut ctx, depth, true).unwrap();

            let stats = driver.stats();
            assert_eq!(stats.connects, 1, "depth {}", depth);
            assert_eq!(stats.closes, 1, "depth {}", depth);
            assert!(!ctx.is_initialized());
        }
    }

    #[test]
    fn test_only_outer_connection_scope_cleans_up() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        let mut outer = ctx.connection().unwrap();
        assert!(outer.is_outer());
        outer.cursor().unwrap();
        {
            let inner = outer.connection().unwrap();
            assert!(!inner.is_outer());
        }
        assert!(outer.is_initialized());
        assert_eq!(driver.stats().closes, 0);
        outer.close().unwrap();
        assert_eq!(driver.stats().closes, 1);
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_unused_connection_scope_never_connects() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        drop(ctx.connection().unwrap());
        assert_eq!(driver.stats().connects, 0);
        assert_eq!(driver.stats().closes, 0);
    }

    #[test]
    fn test_transaction_commits_once_at_outermost_exit() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        {
            let mut outer = ctx.transaction().unwrap();
            assert!(outer.owns_connection());
            outer.cursor().unwrap();
            {
                let mut middle = outer.transaction().unwrap();
                assert!(!middle.owns_connection());
                {
                    let inner = middle.transaction().unwrap();
                    assert_eq!(inner.transaction_depth(), 3);
                    inner.complete().unwrap();
                }
                middle.complete().unwrap();
            }
            assert_eq!(driver.stats().commits, 0);
            outer.complete().unwrap();
        }
        let stats = driver.stats();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.rollbacks, 0);
        assert_eq!(stats.closes, 1);
        assert_eq!(ctx.transaction_depth(), 0);
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_empty_transaction_never_connects() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        ctx.transaction().unwrap().complete().unwrap();
        ctx.transaction().unwrap().abort().unwrap();
        let stats = driver.stats();
        assert_eq!(stats.connects, 0);
        assert_eq!(stats.commits + stats.rollbacks, 0);
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_inner_failure_rolls_back_at_outermost_exit() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        let mut outer = ctx.transaction().unwrap();
        outer.cursor().unwrap();
        {
            let inner = outer.transaction().unwrap();
            inner.abort().unwrap();
        }
        assert_eq!(driver.stats().rollbacks, 0);
        outer.abort().unwrap();
        let stats = driver.stats();
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.commits, 0);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        {
            let mut tx = ctx.transaction().unwrap();
            tx.cursor().unwrap();
        }
        let stats = driver.stats();
        assert_eq!(stats.rollbacks, 1);
        assert_eq!(stats.closes, 1);
        assert_eq!(ctx.transaction_depth(), 0);
    }

    #[test]
    fn test_transaction_inside_connection_scope_keeps_connection() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        let mut conn = ctx.connection().unwrap();
        conn.cursor().unwrap();
        {
            let tx = conn.transaction().unwrap();
            assert!(!tx.owns_connection());
            tx.complete().unwrap();
        }
        assert_eq!(driver.stats().commits, 1);
        assert_eq!(driver.stats().closes, 0);
        assert!(conn.is_connected());
        conn.close().unwrap();
        assert_eq!(driver.stats().closes, 1);
    }

    #[test]
    fn test_failed_commit_rolls_back_and_surfaces_commit_error() {
        let driver = MockDriver::new().failing_commit().failing_rollback();
        let mut ctx = context(&driver);
        let mut tx = ctx.transaction().unwrap();
        tx.cursor().unwrap();
        let err = tx.complete().unwrap_err();
        assert!(err.to_string().contains("mock commit failed"));

        let events = driver.events();
        let commit_at = events.iter().position(|e| *e == Event::Commit).unwrap();
        assert_eq!(events[commit_at + 1], Event::Rollback);
        assert_eq!(events.last(), Some(&Event::Close));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_with_transaction_error_propagates_and_rolls_back() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        let result: DbResult<()> = ctx.with_transaction(|ctx| {
            ctx.execute("insert into t (a) values (?)", &[Value::Int(1)])?;
            Err(DbError::invalid_input("boom"))
        });
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
        let stats = driver.stats();
        assert_eq!(stats.commits, 0);
        assert_eq!(stats.rollbacks, 1);
    }

    #[test]
    fn test_with_transaction_error_survives_rollback_failure() {
        let driver = MockDriver::new().failing_rollback();
        let mut ctx = context(&driver);
        let result: DbResult<()> = ctx.with_transaction(|ctx| {
            ctx.execute("delete from t", &[])?;
            Err(DbError::invalid_input("boom"))
        });
        assert!(matches!(result, Err(DbError::InvalidInput { .. })));
        assert!(!ctx.is_initialized());
    }

    #[test]
    fn test_with_transaction_panic_rolls_back() {
        let driver = MockDriver::new();
        let mut ctx = context(&driver);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: DbResult<()> = ctx.with_transaction(|ctx| {
                ctx.execute("delete from t", &[])?;
                panic!("body panicked");
            });
        }));
        assert!(result.is_err());
        assert_eq!(driver.stats().rollbacks, 1);
        assert_eq!(driver.stats().closes, 1);
    }

    #[test]
    fn test_with_connection_reuses_connection() {
        let driver = MockDriver::new().with_result(&["n"], vec![vec![Value::Int(1)]]);
        let mut ctx = context(&driver);
        ctx.with_connection(|ctx| -> DbResult<()> {
            ctx.query_one("select 1 as n", &[])?;
            ctx.query_one("select 1 as n", &[])?;
            ctx.query_many("select 1 as n", &[])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(driver.stats().connects, 1);
        assert_eq!(driver.stats().closes, 1);
    }

    #[test]
    fn test_contexts_on_separate_threads_are_isolated() {
        let driver = MockDriver::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let database = driver.database();
                std::thread::spawn(move || {
                    let mut ctx = ExecutionContext::with_database(database);
                    ctx.with_transaction(|ctx| -> DbResult<()> {
                        assert_eq!(ctx.transaction_depth(), 1);
                        ctx.execute("insert into t (a) values (?)", &[Value::Int(1)])?;
                        Ok(())
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        let stats = driver.stats();
        assert_eq!(stats.connects, 4);
        assert_eq!(stats.commits, 4);
        assert_eq!(stats.closes, 4);
    }
}
