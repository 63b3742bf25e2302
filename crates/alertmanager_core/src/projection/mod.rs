//! Materialized view of the alert stream.
//!
//! # Responsibility
//! - Fold `AlertRaised` / `AlertAcknowledged` events into the active set.
//! - Answer read-only queries for ingestion and acknowledgment.
//!
//! # Invariants
//! - State is a pure function of the event prefix up to `version`.
//! - Applying a record at or below `version` is a no-op, so re-folding an
//!   overlapping prefix is idempotent.
//! - Acknowledging an absent id is a no-op; presence is checked by services
//!   before the event is emitted.

use crate::model::alert::{Alert, AlertId};
use crate::model::event::{DomainEvent, EventRecord};
use crate::repo::event_log::{EventLog, EventLogResult};
use std::collections::BTreeMap;

/// Active alerts keyed by identity, plus the version last folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertState {
    version: u64,
    active: BTreeMap<AlertId, Alert>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds state by replaying `records` from empty.
    pub fn fold<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> Self {
        let mut state = Self::new();
        for record in records {
            state.apply(record);
        }
        state
    }

    /// Replays the whole stream.
    pub fn load<L: EventLog + ?Sized>(log: &L) -> EventLogResult<Self> {
        let mut state = Self::new();
        state.refresh(log)?;
        Ok(state)
    }

    /// Advances state with events committed after `version`.
    pub fn refresh<L: EventLog + ?Sized>(&mut self, log: &L) -> EventLogResult<()> {
        for record in log.read_from(self.version)? {
            self.apply(&record);
        }
        Ok(())
    }

    pub fn apply(&mut self, record: &EventRecord) {
        if record.version <= self.version {
            return;
        }

        match &record.event {
            DomainEvent::AlertRaised(raised) => {
                self.active.insert(
                    raised.id,
                    Alert {
                        id: raised.id,
                        subject: raised.subject.clone(),
                        details: raised.details.clone(),
                        timestamp: record.meta.timestamp,
                    },
                );
            }
            DomainEvent::AlertAcknowledged(acknowledged) => {
                self.active.remove(&acknowledged.id);
            }
        }
        self.version = record.version;
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Active alerts ordered by identity.
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.active.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.active.get(&id)
    }

    pub fn find_by_subject(&self, subject: &str) -> Option<&Alert> {
        self.active.values().find(|alert| alert.subject == subject)
    }
}

#[cfg(test)]
mod tests {
    use super::AlertState;
    use crate::model::alert::AlertId;
    use crate::model::event::{EventMeta, EventRecord, NewEvent};
    use chrono::{TimeZone, Utc};

    fn records() -> Vec<EventRecord> {
        let meta = EventMeta::system(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        vec![
            NewEvent::alert_raised(AlertId(1), "disk-full", "95%", meta.clone()).into_record(1),
            NewEvent::alert_raised(AlertId(2), "net-down", "eth0", meta.clone()).into_record(2),
            NewEvent::alert_acknowledged(AlertId(1), meta.clone()).into_record(3),
            NewEvent::alert_raised(AlertId(4), "disk-full", "99%", meta).into_record(4),
        ]
    }

    #[test]
    fn fold_tracks_raise_and_acknowledge() {
        let state = AlertState::fold(&records());

        assert_eq!(state.version(), 4);
        let ids: Vec<AlertId> = state.active_alerts().iter().map(|alert| alert.id).collect();
        assert_eq!(ids, vec![AlertId(2), AlertId(4)]);
        assert_eq!(state.find_by_subject("disk-full").unwrap().details, "99%");
        assert!(state.get(AlertId(1)).is_none());
        assert_eq!(state.get(AlertId(4)).unwrap().subject, "disk-full");
    }

    #[test]
    fn acknowledging_unknown_id_is_a_no_op() {
        let meta = EventMeta::system(Utc::now());
        let mut all = records();
        all.push(NewEvent::alert_acknowledged(AlertId(99), meta.clone()).into_record(5));
        all.push(NewEvent::alert_acknowledged(AlertId(1), meta).into_record(6));

        let state = AlertState::fold(&all);
        assert_eq!(state.version(), 6);
        assert_eq!(state.active_count(), 2);
    }

    #[test]
    fn reapplying_a_prefix_is_idempotent() {
        let all = records();
        let mut state = AlertState::fold(&all[..2]);
        for record in &all {
            state.apply(record);
        }
        assert_eq!(state, AlertState::fold(&all));
    }
}
