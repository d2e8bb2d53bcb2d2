pub mod account;
pub mod analysis_cache;
pub mod conversation;
pub mod note;
pub mod patient;
pub mod record;

pub use account::*;
pub use analysis_cache::*;
pub use conversation::*;
pub use note::*;
pub use patient::*;
pub use record::*;

use chrono::NaiveDateTime;

use crate::db::DatabaseError;

/// Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// A stored timestamp that no longer parses means the row was written
/// outside this code path; surface it instead of inventing a date.
pub(crate) fn parse_timestamp(s: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("malformed timestamp {s:?}: {e}")))
}
