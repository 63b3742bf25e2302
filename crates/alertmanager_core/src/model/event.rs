//! Domain events of the alert stream.
//!
//! # Responsibility
//! - Define the two event types the projection understands.
//! - Own the stable type tags and JSON payload encoding used by backends.
//!
//! # Invariants
//! - Type tags are part of the persisted format and never change meaning.
//! - An `EventRecord` is immutable; only the log assigns its `version`.

use crate::model::alert::AlertId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const ALERT_RAISED_TAG: &str = "alert_raised";
pub const ALERT_ACKNOWLEDGED_TAG: &str = "alert_acknowledged";

const SYSTEM_ACTOR: &str = "system";
const EXTERNAL_ACTOR_PREFIX: &str = "external:";

/// Who caused an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The engine itself (ingestion, auto-acknowledge).
    System,
    /// An external caller, identified by a free-form name.
    External(String),
}

impl Actor {
    /// Encodes the actor for the `events.actor` column.
    pub fn to_db(&self) -> String {
        match self {
            Self::System => SYSTEM_ACTOR.to_string(),
            Self::External(name) => format!("{EXTERNAL_ACTOR_PREFIX}{name}"),
        }
    }

    pub fn parse_db(value: &str) -> Option<Self> {
        if value == SYSTEM_ACTOR {
            return Some(Self::System);
        }
        value
            .strip_prefix(EXTERNAL_ACTOR_PREFIX)
            .map(|name| Self::External(name.to_string()))
    }
}

/// Attribution attached to every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub timestamp: DateTime<Utc>,
    pub actor: Actor,
}

impl EventMeta {
    pub fn system(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            actor: Actor::System,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRaised {
    pub id: AlertId,
    pub subject: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertAcknowledged {
    pub id: AlertId,
}

/// Event payloads of the alert stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    AlertRaised(AlertRaised),
    AlertAcknowledged(AlertAcknowledged),
}

impl DomainEvent {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::AlertRaised(_) => ALERT_RAISED_TAG,
            Self::AlertAcknowledged(_) => ALERT_ACKNOWLEDGED_TAG,
        }
    }

    /// Serializes the payload (without the tag) as JSON.
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            Self::AlertRaised(body) => serde_json::to_string(body),
            Self::AlertAcknowledged(body) => serde_json::to_string(body),
        }
    }

    /// Rebuilds an event from its persisted tag and JSON payload.
    pub fn decode(type_tag: &str, payload: &str) -> Result<Self, EventDecodeError> {
        let decoded = match type_tag {
            ALERT_RAISED_TAG => serde_json::from_str(payload).map(Self::AlertRaised),
            ALERT_ACKNOWLEDGED_TAG => serde_json::from_str(payload).map(Self::AlertAcknowledged),
            other => return Err(EventDecodeError::UnknownType(other.to_string())),
        };
        decoded.map_err(|err| EventDecodeError::InvalidPayload {
            type_tag: type_tag.to_string(),
            message: err.to_string(),
        })
    }
}

/// Failure to rebuild a persisted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    UnknownType(String),
    InvalidPayload { type_tag: String, message: String },
}

impl Display for EventDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownType(tag) => write!(f, "unknown event type `{tag}`"),
            Self::InvalidPayload { type_tag, message } => {
                write!(f, "invalid `{type_tag}` payload: {message}")
            }
        }
    }
}

impl Error for EventDecodeError {}

/// An event waiting to be appended; it has no version yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub event_id: Uuid,
    pub meta: EventMeta,
    pub event: DomainEvent,
}

impl NewEvent {
    pub fn new(meta: EventMeta, event: DomainEvent) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            meta,
            event,
        }
    }

    pub fn alert_raised(
        id: AlertId,
        subject: impl Into<String>,
        details: impl Into<String>,
        meta: EventMeta,
    ) -> Self {
        Self::new(
            meta,
            DomainEvent::AlertRaised(AlertRaised {
                id,
                subject: subject.into(),
                details: details.into(),
            }),
        )
    }

    pub fn alert_acknowledged(id: AlertId, meta: EventMeta) -> Self {
        Self::new(meta, DomainEvent::AlertAcknowledged(AlertAcknowledged { id }))
    }

    /// Binds the event to the version the log assigned it.
    pub fn into_record(self, version: u64) -> EventRecord {
        EventRecord {
            version,
            event_id: self.event_id,
            meta: self.meta,
            event: self.event,
        }
    }
}

/// A committed event as read back from the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub version: u64,
    pub event_id: Uuid,
    pub meta: EventMeta,
    pub event: DomainEvent,
}
