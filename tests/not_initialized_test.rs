//! Operations before any driver is installed fail with `NotInitialized`.
//!
//! Kept in its own test binary so no other test installs the process-wide
//! database first.

use dbctx::db::{self, ExecutionContext};
use dbctx::{DbError, Insert, Value};

#[test]
fn test_every_operation_fails_before_install() {
    assert!(!db::is_installed());
    let mut ctx = ExecutionContext::new();

    assert!(matches!(
        ctx.query_many("select 1", &[]),
        Err(DbError::NotInitialized)
    ));
    assert!(matches!(
        ctx.query_one("select 1", &[]),
        Err(DbError::NotInitialized)
    ));
    assert!(matches!(
        ctx.query_scalar("select 1", &[]),
        Err(DbError::NotInitialized)
    ));
    assert!(matches!(
        ctx.execute("delete from t", &[]),
        Err(DbError::NotInitialized)
    ));
    assert!(matches!(
        ctx.insert(&Insert::into("t").value("a", Value::Int(1))),
        Err(DbError::NotInitialized)
    ));

    let result: Result<(), DbError> = ctx.with_transaction(|tx| tx.execute("delete from t", &[]).map(|_| ()));
    assert!(matches!(result, Err(DbError::NotInitialized)));

    assert!(!ctx.is_initialized());
    assert_eq!(ctx.transaction_depth(), 0);
}

#[test]
fn test_scopes_enter_but_cursor_fails() {
    let mut ctx = ExecutionContext::new();
    let mut conn = ctx.connection().unwrap();
    assert!(matches!(conn.cursor().err(), Some(DbError::NotInitialized)));
    conn.close().unwrap();
}
