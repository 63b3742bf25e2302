//! Dead man's switch model and its correlation with active alerts.
//!
//! # Invariants
//! - `subject` is the switch identity; a check-in overwrites `ttl`.
//! - A switch correlates with an alert on subject equality only.

use crate::model::alert::{Alert, AlertCandidate};
use crate::model::ttl::{format_duration, parse_ttl_spec, TtlParseError};
use crate::model::STORED_SUBSEC_DIGITS;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Liveness monitor that must be checked in before `ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadMansSwitch {
    pub subject: String,
    /// Absolute deadline for the next check-in.
    pub ttl: DateTime<Utc>,
}

impl DeadMansSwitch {
    pub fn new(subject: impl Into<String>, ttl: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            ttl,
        }
    }

    /// Returns whether the deadline has passed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ttl < now
    }

    /// Human-readable lateness summary used as alert details.
    pub fn lateness_details(&self, now: DateTime<Utc>) -> String {
        format!(
            "Check-in late by {} ({})",
            format_duration(now - self.ttl),
            self.ttl.to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
    }

    /// The alert this switch raises when it has expired.
    pub fn as_candidate(&self, now: DateTime<Utc>) -> AlertCandidate {
        AlertCandidate::new(self.subject.clone(), self.lateness_details(now), now)
    }
}

/// Returns whether `alert` is the one fired by `switch`.
pub fn switch_matches_alert(switch: &DeadMansSwitch, alert: &Alert) -> bool {
    switch.subject == alert.subject
}

/// Raw check-in input: TTL still in spec form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckinRequest {
    pub subject: String,
    pub ttl: String,
}

impl CheckinRequest {
    pub fn new(subject: impl Into<String>, ttl: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ttl: ttl.into(),
        }
    }

    /// Validates input and expands the TTL spec into an absolute deadline.
    ///
    /// The subject is kept verbatim so it matches alerts raised for it.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<DeadMansSwitch, CheckinValidationError> {
        if self.subject.trim().is_empty() {
            return Err(CheckinValidationError::EmptySubject);
        }
        if self.ttl.trim().is_empty() {
            return Err(CheckinValidationError::EmptyTtl);
        }

        let duration: Duration = parse_ttl_spec(&self.ttl)?;
        let ttl = now
            .checked_add_signed(duration)
            .ok_or_else(|| CheckinValidationError::Ttl(TtlParseError::OutOfRange(self.ttl.clone())))?
            .trunc_subsecs(STORED_SUBSEC_DIGITS);
        Ok(DeadMansSwitch::new(self.subject.as_str(), ttl))
    }
}

/// Check-in input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinValidationError {
    EmptySubject,
    EmptyTtl,
    Ttl(TtlParseError),
}

impl Display for CheckinValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySubject => write!(f, "check-in subject must not be empty"),
            Self::EmptyTtl => write!(f, "check-in ttl must not be empty"),
            Self::Ttl(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckinValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Ttl(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TtlParseError> for CheckinValidationError {
    fn from(value: TtlParseError) -> Self {
        Self::Ttl(value)
    }
}
