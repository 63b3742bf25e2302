//! SQLite event log backend.
//!
//! # Responsibility
//! - Persist one named stream in the shared `events` table.
//! - Implement conditional append as a single `BEGIN IMMEDIATE` transaction.
//!
//! # Invariants
//! - `(stream, version)` is the primary key; a duplicate version from a
//!   racing writer surfaces as `ConcurrencyConflict`, never as a partial batch.
//! - Reads reject gaps, unknown type tags and malformed payloads.

use crate::model::event::{Actor, DomainEvent, EventMeta, EventRecord, NewEvent};
use crate::repo::event_log::{EventLog, EventLogError, EventLogResult};
use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use rusqlite::{ffi, params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

/// SQLite-backed event log for one stream.
pub struct SqliteEventLog<'conn> {
    conn: &'conn Connection,
    stream: String,
}

impl<'conn> SqliteEventLog<'conn> {
    /// Wraps a migrated connection (see `db::open_db`).
    pub fn new(conn: &'conn Connection, stream: impl Into<String>) -> Self {
        Self {
            conn,
            stream: stream.into(),
        }
    }
}

impl EventLog for SqliteEventLog<'_> {
    fn stream(&self) -> &str {
        &self.stream
    }

    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                version,
                event_id,
                event_type,
                payload,
                occurred_at,
                actor
             FROM events
             WHERE stream = ?1
               AND version > ?2
             ORDER BY version ASC;",
        )?;

        let mut rows = stmt.query(params![self.stream.as_str(), to_db_version(after_version)?])?;
        let mut records = Vec::new();
        let mut next_version = after_version + 1;
        while let Some(row) = rows.next()? {
            let record = parse_event_row(row)?;
            if record.version != next_version {
                return Err(EventLogError::InvalidData(format!(
                    "stream `{}` has a gap: expected version {next_version}, found {}",
                    self.stream, record.version
                )));
            }
            next_version += 1;
            records.push(record);
        }

        Ok(records)
    }

    fn current_version(&self) -> EventLogResult<u64> {
        head_version(self.conn, &self.stream)
    }

    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64> {
        // The immediate transaction takes the write lock up front, so the head
        // read below cannot be invalidated before commit.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let actual = head_version(&tx, &self.stream)?;
        if actual != expected_version {
            warn!(
                "event=event_append module=repo status=conflict stream={} expected_version={} actual_version={}",
                self.stream, expected_version, actual
            );
            return Err(EventLogError::ConcurrencyConflict {
                expected: expected_version,
                actual,
            });
        }

        let mut version = expected_version;
        for event in events {
            version += 1;
            insert_event(&tx, &self.stream, version, event).map_err(|err| {
                conflict_from_constraint(err, expected_version, &self.stream)
            })?;
        }

        if let Err(err) = tx.commit() {
            error!(
                "event=event_append module=repo status=error stream={} expected_version={} error_code=commit_failed error={}",
                self.stream, expected_version, err
            );
            return Err(EventLogError::CommitOutcomeUnknown(err.into()));
        }

        debug!(
            "event=event_append module=repo status=ok stream={} events={} version={}",
            self.stream,
            events.len(),
            version
        );
        Ok(version)
    }
}

fn insert_event(
    tx: &Transaction<'_>,
    stream: &str,
    version: u64,
    event: &NewEvent,
) -> EventLogResult<()> {
    let payload = event.event.payload_json().map_err(|err| {
        EventLogError::InvalidData(format!("cannot encode `{}` payload: {err}", event.event.type_tag()))
    })?;

    tx.execute(
        "INSERT INTO events (
            stream,
            version,
            event_id,
            event_type,
            payload,
            occurred_at,
            actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            stream,
            to_db_version(version)?,
            event.event_id.to_string(),
            event.event.type_tag(),
            payload,
            event.meta.timestamp.timestamp_millis(),
            event.meta.actor.to_db(),
        ],
    )?;
    Ok(())
}

fn conflict_from_constraint(err: EventLogError, expected: u64, stream: &str) -> EventLogError {
    if let EventLogError::Db(crate::db::DbError::Sqlite(rusqlite::Error::SqliteFailure(
        failure,
        _,
    ))) = &err
    {
        if failure.code == ErrorCode::ConstraintViolation
            && failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            warn!(
                "event=event_append module=repo status=conflict stream={stream} expected_version={expected} reason=primary_key"
            );
            return EventLogError::ConcurrencyConflict {
                expected,
                actual: expected + 1,
            };
        }
    }
    err
}

fn head_version(conn: &Connection, stream: &str) -> EventLogResult<u64> {
    let head: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM events WHERE stream = ?1;",
        [stream],
        |row| row.get(0),
    )?;
    from_db_version(head)
}

fn parse_event_row(row: &Row<'_>) -> EventLogResult<EventRecord> {
    let version = from_db_version(row.get("version")?)?;

    let event_id_text: String = row.get("event_id")?;
    let event_id = Uuid::parse_str(&event_id_text).map_err(|_| {
        EventLogError::InvalidData(format!("invalid uuid `{event_id_text}` in events.event_id"))
    })?;

    let type_tag: String = row.get("event_type")?;
    let payload: String = row.get("payload")?;
    let event = DomainEvent::decode(&type_tag, &payload)
        .map_err(|err| EventLogError::InvalidData(format!("version {version}: {err}")))?;

    let occurred_at: i64 = row.get("occurred_at")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(occurred_at).ok_or_else(|| {
        EventLogError::InvalidData(format!("invalid timestamp `{occurred_at}` in events.occurred_at"))
    })?;

    let actor_text: String = row.get("actor")?;
    let actor = Actor::parse_db(&actor_text).ok_or_else(|| {
        EventLogError::InvalidData(format!("invalid actor `{actor_text}` in events.actor"))
    })?;

    Ok(EventRecord {
        version,
        event_id,
        meta: EventMeta { timestamp, actor },
        event,
    })
}

fn to_db_version(version: u64) -> EventLogResult<i64> {
    i64::try_from(version)
        .map_err(|_| EventLogError::InvalidData(format!("version {version} exceeds storage range")))
}

fn from_db_version(version: i64) -> EventLogResult<u64> {
    u64::try_from(version)
        .map_err(|_| EventLogError::InvalidData(format!("invalid version `{version}` in events.version")))
}
