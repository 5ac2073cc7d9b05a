//! Time-ordered unique identifiers for primary keys.

use chrono::Utc;
use uuid::Uuid;

/// Length of ids produced by [`next_id`].
pub const ID_LENGTH: usize = 50;

/// Generate a 50-character id: the current time in milliseconds (15 digits,
/// zero padded), 32 hex chars of a random uuid, then `000`.
///
/// Ids created in later milliseconds sort after earlier ones.
pub fn next_id() -> String {
    next_id_at(Utc::now().timestamp_millis())
}

/// Same as [`next_id`] with an explicit millisecond timestamp.
pub fn next_id_at(millis: i64) -> String {
    format!("{:015}{}000", millis, Uuid::new_v4().simple())
}
