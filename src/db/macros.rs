//! Database dispatch macros for reducing code duplication.
//!
//! The sqlx driver keeps one concrete connection type per backend. These
//! macros generate the per-backend match arms while keeping each call site
//! readable.

/// Macro for generating database dispatch match arms over `DbConn`.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(conn, {
///     MySql(c) => mysql::execute(c, sql, params).await,
///     Postgres(c) => postgres::execute(c, sql, params).await,
///     SQLite(c) => sqlite::execute(c, sql, params).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($conn:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $conn {
            $(
                $crate::db::connector::DbConn::$variant($c) => $body,
            )+
        }
    };
}

/// Dispatch the same expression to every backend variant.
///
/// Useful when the body is identical across backends because it only uses
/// the generic `sqlx::Connection` / `sqlx::Executor` API.
#[macro_export]
macro_rules! db_dispatch_all {
    ($conn:expr, $c:ident => $body:expr) => {
        $crate::impl_db_dispatch!($conn, {
            MySql($c) => $body,
            Postgres($c) => $body,
            SQLite($c) => $body,
        })
    };
}

pub use db_dispatch_all;
pub use impl_db_dispatch;
