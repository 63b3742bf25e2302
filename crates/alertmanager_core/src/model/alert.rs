//! Alert and candidate-alert shapes.
//!
//! # Invariants
//! - `AlertId` values are assigned by the event log, never by callers.
//! - A candidate's subject is the deduplication key and must not be blank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

/// Sequential alert identity.
///
/// Equal to the stream version assigned to the alert's `AlertRaised` event,
/// which makes identities unique, strictly increasing and totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub u64);

impl AlertId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl Display for AlertId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AlertId {
    type Err = ParseIntError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value.trim().parse::<u64>().map(Self)
    }
}

/// An alert that is currently active in the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Serialized as `alert_key` to keep the normalized external shape.
    #[serde(rename = "alert_key")]
    pub id: AlertId,
    /// Free text; deduplication key.
    pub subject: String,
    /// Human-readable cause.
    pub details: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// An inbound alert that has not been accepted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertCandidate {
    pub subject: String,
    #[serde(default)]
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

impl AlertCandidate {
    pub fn new(
        subject: impl Into<String>,
        details: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            details: details.into(),
            timestamp,
        }
    }

    /// Validates candidate shape before it reaches ingestion policy.
    pub fn validate(&self) -> Result<(), AlertValidationError> {
        if self.subject.trim().is_empty() {
            return Err(AlertValidationError::EmptySubject);
        }
        Ok(())
    }
}

/// Candidate validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertValidationError {
    EmptySubject,
}

impl Display for AlertValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySubject => write!(f, "alert subject must not be blank"),
        }
    }
}

impl Error for AlertValidationError {}

#[cfg(test)]
mod tests {
    use super::{AlertCandidate, AlertId, AlertValidationError};
    use chrono::Utc;

    #[test]
    fn alert_id_parses_trimmed_decimal() {
        assert_eq!(" 42 ".parse::<AlertId>().unwrap(), AlertId(42));
        assert!("abc".parse::<AlertId>().is_err());
        assert!("-1".parse::<AlertId>().is_err());
    }

    #[test]
    fn blank_subject_is_rejected() {
        let candidate = AlertCandidate::new("  ", "details", Utc::now());
        assert_eq!(
            candidate.validate(),
            Err(AlertValidationError::EmptySubject)
        );
    }

    #[test]
    fn empty_details_are_allowed() {
        let candidate = AlertCandidate::new("disk-full", "", Utc::now());
        assert!(candidate.validate().is_ok());
    }
}
