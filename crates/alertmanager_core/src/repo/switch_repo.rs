//! Dead man's switch repository contracts and SQLite implementation.
//!
//! # Invariants
//! - One row per subject; a check-in overwrites the previous TTL.
//! - Switches are never deleted.
//! - List order is `subject ASC`.

use crate::db::DbError;
use crate::model::switch::DeadMansSwitch;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Switch table errors.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted switch data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the switch table.
pub trait SwitchRepository {
    /// Inserts or overwrites the switch for `switch.subject`.
    fn put_switch(&self, switch: &DeadMansSwitch) -> RepoResult<()>;
    fn get_switch(&self, subject: &str) -> RepoResult<Option<DeadMansSwitch>>;
    fn list_switches(&self) -> RepoResult<Vec<DeadMansSwitch>>;
}

impl<S: SwitchRepository + ?Sized> SwitchRepository for &S {
    fn put_switch(&self, switch: &DeadMansSwitch) -> RepoResult<()> {
        (**self).put_switch(switch)
    }

    fn get_switch(&self, subject: &str) -> RepoResult<Option<DeadMansSwitch>> {
        (**self).get_switch(subject)
    }

    fn list_switches(&self) -> RepoResult<Vec<DeadMansSwitch>> {
        (**self).list_switches()
    }
}

/// SQLite-backed switch repository.
pub struct SqliteSwitchRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSwitchRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SwitchRepository for SqliteSwitchRepository<'_> {
    fn put_switch(&self, switch: &DeadMansSwitch) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO dead_mans_switches (subject, ttl, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(subject) DO UPDATE SET
                ttl = excluded.ttl,
                updated_at = excluded.updated_at;",
            params![
                switch.subject.as_str(),
                switch.ttl.timestamp_millis(),
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn get_switch(&self, subject: &str) -> RepoResult<Option<DeadMansSwitch>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject, ttl
             FROM dead_mans_switches
             WHERE subject = ?1;",
        )?;
        let mut rows = stmt.query([subject])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_switch_row(row)?));
        }
        Ok(None)
    }

    fn list_switches(&self) -> RepoResult<Vec<DeadMansSwitch>> {
        let mut stmt = self.conn.prepare(
            "SELECT subject, ttl
             FROM dead_mans_switches
             ORDER BY subject ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut switches = Vec::new();
        while let Some(row) = rows.next()? {
            switches.push(parse_switch_row(row)?);
        }
        Ok(switches)
    }
}

fn parse_switch_row(row: &Row<'_>) -> RepoResult<DeadMansSwitch> {
    let subject: String = row.get("subject")?;
    let ttl_ms: i64 = row.get("ttl")?;
    let ttl = DateTime::<Utc>::from_timestamp_millis(ttl_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid ttl `{ttl_ms}` in dead_mans_switches.ttl for `{subject}`"
        ))
    })?;
    Ok(DeadMansSwitch { subject, ttl })
}
