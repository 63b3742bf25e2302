//! In-memory event log backend.

use crate::model::event::{EventRecord, NewEvent};
use crate::repo::event_log::{EventLog, EventLogError, EventLogResult};
use std::sync::{Mutex, MutexGuard};

/// Process-local event log guarded by a mutex.
///
/// Safe to share between threads (`Arc<InMemoryEventLog>`); the mutex is
/// only held for the duration of one read or one conditional append.
#[derive(Debug)]
pub struct InMemoryEventLog {
    stream: String,
    records: Mutex<Vec<EventRecord>>,
}

impl InMemoryEventLog {
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> EventLogResult<MutexGuard<'_, Vec<EventRecord>>> {
        self.records
            .lock()
            .map_err(|_| EventLogError::Unavailable("in-memory event log lock poisoned".to_string()))
    }
}

impl EventLog for InMemoryEventLog {
    fn stream(&self) -> &str {
        &self.stream
    }

    fn read_from(&self, after_version: u64) -> EventLogResult<Vec<EventRecord>> {
        let records = self.lock()?;
        let start = usize::try_from(after_version).unwrap_or(usize::MAX);
        Ok(records.iter().skip(start).cloned().collect())
    }

    fn current_version(&self) -> EventLogResult<u64> {
        Ok(self.lock()?.len() as u64)
    }

    fn append(&self, expected_version: u64, events: &[NewEvent]) -> EventLogResult<u64> {
        let mut records = self.lock()?;
        let actual = records.len() as u64;
        if actual != expected_version {
            return Err(EventLogError::ConcurrencyConflict {
                expected: expected_version,
                actual,
            });
        }

        records.extend(
            events
                .iter()
                .cloned()
                .enumerate()
                .map(|(offset, event)| event.into_record(expected_version + offset as u64 + 1)),
        );
        Ok(records.len() as u64)
    }
}
