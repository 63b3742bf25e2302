#![allow(dead_code)]

use alertmanager_core::{
    AlertId, AlertManagerConfig, AlertNotification, EventLog, EventLogResult, EventMeta,
    EventRecord, InMemoryEventLog, NewEvent, NotificationError, Notifier,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

pub fn config(max_active_alerts: usize) -> AlertManagerConfig {
    AlertManagerConfig {
        max_active_alerts,
        ..AlertManagerConfig::default()
    }
}

/// Whole-second timestamps survive the millisecond storage round trip.
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<AlertNotification>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|notification| notification.subject.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &AlertNotification) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: &AlertNotification) -> Result<(), NotificationError> {
        Err(NotificationError::new("smtp relay unreachable"))
    }
}

/// A write another process slips in right before our append.
pub enum RivalWrite {
    Raise(&'static str),
    Acknowledge(AlertId),
}

/// Event log that lets a rival writer win the race on upcoming appends.
pub struct RacingLog {
    pub inner: InMemoryEventLog,
    rivals: Mutex<VecDeque<RivalWrite>>,
}

impl RacingLog {
    pub fn new(rivals: Vec<RivalWrite>) -> Self {
        Self {
            inner: InMemoryEventLog::new("alerts"),
            rivals: Mutex::new(rivals.into()),
        }
    }
}

impl EventLog for RacingLog {
    fn stream(&self) -> &str {
        self.inner.stream()
    }

    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>> {
        self.inner.read_from(after_version)
    }

    fn current_version(&self) -> EventLogResult<u64> {
        self.inner.current_version()
    }

    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64> {
        let rival = self.rivals.lock().unwrap().pop_front();
        if let Some(rival) = rival {
            let head = self.inner.current_version()?;
            let meta = EventMeta::system(Utc::now());
            let event = match rival {
                RivalWrite::Raise(subject) => {
                    NewEvent::alert_raised(AlertId(head + 1), subject, "rival", meta)
                }
                RivalWrite::Acknowledge(id) => NewEvent::alert_acknowledged(id, meta),
            };
            self.inner.append(head, &[event])?;
        }
        self.inner.append(expected_version, events)
    }
}
