//! Optimistic read -> decide -> append cycle.

use crate::model::event::NewEvent;
use crate::projection::AlertState;
use crate::repo::event_log::EventLog;
use crate::service::alert_service::AlertServiceError;
use log::debug;

/// Events to append plus the value handed back once they are committed.
pub(crate) struct WritePlan<T> {
    pub events: Vec<NewEvent>,
    pub outcome: T,
}

/// Result of a finished write cycle.
pub(crate) struct WriteResult<T> {
    pub outcome: T,
    /// `false` when the plan was empty and the log was not touched.
    pub committed: bool,
    pub attempts: u32,
}

/// Runs `decide` against fresh state and appends its events conditioned on
/// the version it saw, re-reading and re-deciding after each conflict.
///
/// `decide` must be a pure function of the state: it runs once per attempt.
pub(crate) fn transact_write<L, T, F>(
    log: &L,
    max_attempts: u32,
    operation: &'static str,
    mut decide: F,
) -> Result<WriteResult<T>, AlertServiceError>
where
    L: EventLog + ?Sized,
    F: FnMut(&AlertState) -> Result<WritePlan<T>, AlertServiceError>,
{
    let max_attempts = max_attempts.max(1);
    let mut state = AlertState::new();

    for attempt in 1..=max_attempts {
        state.refresh(log)?;
        let plan = decide(&state)?;
        if plan.events.is_empty() {
            return Ok(WriteResult {
                outcome: plan.outcome,
                committed: false,
                attempts: attempt,
            });
        }

        match log.append(state.version(), &plan.events) {
            Ok(_) => {
                return Ok(WriteResult {
                    outcome: plan.outcome,
                    committed: true,
                    attempts: attempt,
                });
            }
            Err(err) if err.is_conflict() => {
                debug!(
                    "event={operation} module=service status=retry stream={} attempt={attempt} max_attempts={max_attempts}",
                    log.stream()
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AlertServiceError::ConflictRetriesExhausted {
        attempts: max_attempts,
    })
}
