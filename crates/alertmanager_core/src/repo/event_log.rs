//! Event log contract.
//!
//! # Invariants
//! - Versions of one stream start at 1 and are contiguous.
//! - `append` is all-or-nothing: a failed batch leaves no trace.
//! - `append` succeeds only when the stream head equals `expected_version`.

use crate::db::DbError;
use crate::model::event::{EventRecord, NewEvent};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub type EventLogResult<T> = Result<T, EventLogError>;

/// Event log failures.
#[derive(Debug)]
pub enum EventLogError {
    /// Another writer advanced the stream past `expected`.
    ConcurrencyConflict { expected: u64, actual: u64 },
    Db(DbError),
    /// The commit itself failed; the batch may or may not be durable.
    CommitOutcomeUnknown(DbError),
    /// Persisted record cannot be decoded.
    InvalidData(String),
    /// Backend cannot serve requests (e.g. poisoned in-memory lock).
    Unavailable(String),
}

impl EventLogError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

impl Display for EventLogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConcurrencyConflict { expected, actual } => write!(
                f,
                "concurrency conflict: expected stream version {expected}, found {actual}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::CommitOutcomeUnknown(err) => write!(
                f,
                "commit outcome unknown, re-read the stream before retrying: {err}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted event data: {message}"),
            Self::Unavailable(message) => write!(f, "event log unavailable: {message}"),
        }
    }
}

impl Error for EventLogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) | Self::CommitOutcomeUnknown(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for EventLogError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for EventLogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Append-only, versioned event stream.
pub trait EventLog {
    /// Name of the stream this log reads and writes.
    fn stream(&self) -> &str;

    /// Returns all events with `version > after_version`, in version order.
    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>>;

    /// Returns the version of the last committed event (0 for empty).
    fn current_version(&self) -> EventLogResult<u64>;

    /// Appends `events` if the stream head is still `expected_version`.
    ///
    /// On success the batch occupies versions `expected_version + 1 ..=
    /// expected_version + events.len()` and the new head is returned. An
    /// empty batch only checks the head.
    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64>;
}

impl<L: EventLog + ?Sized> EventLog for &L {
    fn stream(&self) -> &str {
        (**self).stream()
    }

    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>> {
        (**self).read_from(after_version)
    }

    fn current_version(&self) -> EventLogResult<u64> {
        (**self).current_version()
    }

    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64> {
        (**self).append(expected_version, events)
    }
}

impl<L: EventLog + ?Sized> EventLog for Arc<L> {
    fn stream(&self) -> &str {
        (**self).stream()
    }

    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>> {
        (**self).read_from(after_version)
    }

    fn current_version(&self) -> EventLogResult<u64> {
        (**self).current_version()
    }

    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64> {
        (**self).append(expected_version, events)
    }
}
