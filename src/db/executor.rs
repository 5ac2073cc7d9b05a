//! Query execution helpers.
//!
//! These run on an [`ExecutionContext`] and open an implicit connection scope
//! for their own duration, so they work both standalone and inside an
//! explicit connection or transaction scope (in which case they share its
//! connection):
//! - `query_many` / `query_one` / `query_scalar` for row-producing statements
//! - `execute` for INSERT / UPDATE / DELETE, auto-committing when no
//!   transaction is open
//!
//! Statement templates use `?` placeholders, rewritten into the driver's
//! style before execution. Every statement is logged at debug level and
//! profiled.

use crate::db::context::ExecutionContext;
use crate::db::scope::ConnectionScope;
use crate::error::{DbError, DbResult};
use crate::models::{Record, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statements slower than this are logged at warn level.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(100);

/// Log the elapsed time of a statement.
pub(crate) fn profile(start: Instant, sql: &str) {
    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed > SLOW_QUERY_THRESHOLD {
        warn!(elapsed_ms, sql = %sql, "[PROFILING] [DB]");
    } else {
        info!(elapsed_ms, sql = %sql, "[PROFILING] [DB]");
    }
}

impl ExecutionContext {
    /// Run a select and return every row; empty when nothing matches.
    pub fn query_many(&mut self, sql: &str, params: &[Value]) -> DbResult<Vec<Record>> {
        self.select(sql, params, false)
    }

    /// Run a select and return the first row, or `None` when nothing matches.
    ///
    /// Additional rows are ignored; their order is whatever the driver returns.
    pub fn query_one(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<Record>> {
        Ok(self.select(sql, params, true)?.into_iter().next())
    }

    /// Run a select expected to produce a single column and return its value
    /// from the first row.
    ///
    /// `None` when nothing matches; [`DbError::MulticolumnResult`] when the row
    /// does not have exactly one column.
    pub fn query_scalar(&mut self, sql: &str, params: &[Value]) -> DbResult<Option<Value>> {
        let Some(record) = self.query_one(sql, params)? else {
            return Ok(None);
        };
        if record.len() != 1 {
            return Err(DbError::MulticolumnResult {
                columns: record.len(),
            });
        }
        Ok(record.into_values().into_iter().next())
    }

    /// Run an INSERT / UPDATE / DELETE and return the affected-row count.
    ///
    /// Outside a transaction the statement is committed immediately.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let mut scope = ConnectionScope::enter(self)?;
        let sql = scope.placeholder_style().rewrite(sql).into_owned();
        debug!(sql = %sql, params = ?params, "SQL");

        let start = Instant::now();
        let result = run_update(&mut scope, &sql, params);
        profile(start, &sql);
        result
    }

    fn select(&mut self, sql: &str, params: &[Value], first: bool) -> DbResult<Vec<Record>> {
        let mut scope = ConnectionScope::enter(self)?;
        let sql = scope.placeholder_style().rewrite(sql).into_owned();
        debug!(sql = %sql, params = ?params, "SQL");

        let start = Instant::now();
        let result = run_select(&mut scope, &sql, params, first);
        profile(start, &sql);
        result
    }
}

fn run_select(
    ctx: &mut ExecutionContext,
    sql: &str,
    params: &[Value],
    first: bool,
) -> DbResult<Vec<Record>> {
    let mut cursor = ctx.cursor()?;
    cursor.query(sql, params)?;
    let names = cursor.columns().to_vec();
    let rows = if first {
        cursor.fetch_one()?.into_iter().collect()
    } else {
        cursor.fetch_all()?
    };
    Ok(rows
        .into_iter()
        .map(|values| Record::new(names.clone(), values))
        .collect())
}

fn run_update(ctx: &mut ExecutionContext, sql: &str, params: &[Value]) -> DbResult<u64> {
    let rows_affected = ctx.cursor()?.execute(sql, params)?;
    if ctx.transaction_depth() == 0 {
        debug!("auto commit");
        ctx.commit()?;
    }
    Ok(rows_affected)
}
