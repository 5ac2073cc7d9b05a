//! Driver seam.
//!
//! The scoped connection machinery only needs three capabilities from a
//! database binding: open a raw connection, get a cursor from it, and
//! commit / roll back / close it. Those are the traits below. The
//! sqlx-backed implementation lives in [`crate::db::connector`]; tests plug in
//! their own.
//!
//! A [`Database`] bundles a driver factory with the placeholder style its
//! statements use. One can be installed process-wide, exactly once, with
//! [`install`] (or [`crate::db::init`] for a connection URL). Until then the
//! process-wide database is a sentinel whose factory fails every connect with
//! [`DbError::NotInitialized`].

use crate::error::{DbError, DbResult};
use crate::models::{PlaceholderStyle, Value};
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};
use tracing::info;

/// A cursor over one raw connection.
pub trait Cursor {
    /// Run a row-producing statement and buffer its result set.
    fn query(&mut self, sql: &str, params: &[Value]) -> DbResult<()>;

    /// Run a statement for its effect and return the affected-row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> DbResult<u64>;

    /// Column names of the last result set, in result order.
    fn columns(&self) -> &[String];

    /// Next buffered row, or `None` when exhausted.
    fn fetch_one(&mut self) -> DbResult<Option<Vec<Value>>>;

    /// All remaining buffered rows.
    fn fetch_all(&mut self) -> DbResult<Vec<Vec<Value>>>;
}

/// A physical connection opened by a [`DriverFactory`].
pub trait RawConnection: Send {
    fn cursor(&mut self) -> DbResult<Box<dyn Cursor + '_>>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Close the physical connection. Uncommitted work is discarded.
    fn close(self: Box<Self>) -> DbResult<()>;
}

/// Opens raw connections.
pub trait DriverFactory: Send + Sync {
    fn connect(&self) -> DbResult<Box<dyn RawConnection>>;
}

impl<F> DriverFactory for F
where
    F: Fn() -> DbResult<Box<dyn RawConnection>> + Send + Sync,
{
    fn connect(&self) -> DbResult<Box<dyn RawConnection>> {
        self()
    }
}

/// Factory used before anything is installed.
struct Uninitialized;

impl DriverFactory for Uninitialized {
    fn connect(&self) -> DbResult<Box<dyn RawConnection>> {
        Err(DbError::NotInitialized)
    }
}

/// A driver factory together with its placeholder style.
pub struct Database {
    factory: Box<dyn DriverFactory>,
    placeholder: PlaceholderStyle,
    label: String,
}

impl Database {
    /// Create a database from a factory and the placeholder style its driver expects.
    pub fn new(factory: impl DriverFactory + 'static, placeholder: PlaceholderStyle) -> Self {
        Self {
            factory: Box::new(factory),
            placeholder,
            label: "custom".to_string(),
        }
    }

    /// Attach a display label (used in logs; never contains credentials).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn uninitialized() -> Self {
        Self::new(Uninitialized, PlaceholderStyle::default()).with_label("uninitialized")
    }

    /// Open a new raw connection.
    pub fn connect(&self) -> DbResult<Box<dyn RawConnection>> {
        self.factory.connect()
    }

    pub fn placeholder(&self) -> PlaceholderStyle {
        self.placeholder
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("label", &self.label)
            .field("placeholder", &self.placeholder)
            .finish()
    }
}

static INSTALLED: OnceLock<Arc<Database>> = OnceLock::new();
static SENTINEL: LazyLock<Arc<Database>> = LazyLock::new(|| Arc::new(Database::uninitialized()));

/// Install the process-wide database.
///
/// Must happen once, before the first scope is entered. A second call fails
/// with [`DbError::AlreadyInitialized`] and leaves the first one in place.
pub fn install(database: Database) -> DbResult<()> {
    let label = database.label.clone();
    let placeholder = database.placeholder;
    INSTALLED
        .set(Arc::new(database))
        .map_err(|_| DbError::AlreadyInitialized)?;
    info!(database = %label, placeholder = ?placeholder, "Database driver installed");
    Ok(())
}

/// The process-wide database, or the not-initialized sentinel.
pub fn installed() -> Arc<Database> {
    INSTALLED
        .get()
        .cloned()
        .unwrap_or_else(|| Arc::clone(&SENTINEL))
}

/// Whether [`install`] has run.
pub fn is_installed() -> bool {
    INSTALLED.get().is_some()
}
