//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with parameterized queries over a
//! SQLite backend.

pub mod articles;
pub mod context;
pub mod diesel_models;
pub mod domains;
pub mod migrations;
pub mod pool;
pub mod queue;
pub mod util;

pub use articles::{
    ArticleRepository, CompletenessReport, DeleteOutcome, FlagColumn, InsertOutcome, MatchUpdate,
    TermField,
};
pub use context::DbContext;
pub use domains::DomainRepository;
pub use pool::{DbError, DbPool};
pub use queue::QueueRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format a datetime for storage.
///
/// Fixed-width microsecond precision keeps stored timestamps ordered when
/// compared as text.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
