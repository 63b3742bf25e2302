//! Alert ingestion and acknowledgment use cases.
//!
//! # Responsibility
//! - Apply dedup and capacity policy to candidate alerts and commit the
//!   accepted ones in one conditional append.
//! - Acknowledge active alerts through `AlertAcknowledged` events.
//!
//! # Invariants
//! - At most one active alert per subject; enforced here, not by storage.
//! - Active alerts never exceed `max_active_alerts` through ingestion.
//! - Candidates are accepted in submission order.
//! - A storage error returned by the commit step leaves the outcome unknown;
//!   callers must re-read state instead of assuming either result.

use crate::config::AlertManagerConfig;
use crate::model::alert::{Alert, AlertCandidate, AlertId, AlertValidationError};
use crate::model::event::{Actor, EventMeta, NewEvent};
use crate::model::STORED_SUBSEC_DIGITS;
use crate::notify::{AlertNotification, Notifier};
use crate::projection::AlertState;
use crate::repo::event_log::{EventLog, EventLogError};
use crate::service::transact::{transact_write, WritePlan};
use chrono::{SubsecRound, Utc};
use log::{error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from alert use cases.
#[derive(Debug)]
pub enum AlertServiceError {
    /// Candidate at `index` is malformed; nothing was committed.
    InvalidCandidate {
        index: usize,
        source: AlertValidationError,
    },
    /// Alert is not active (never existed or already acknowledged).
    NotFound(AlertId),
    /// Every attempt lost the race against another writer.
    ConflictRetriesExhausted { attempts: u32 },
    Storage(EventLogError),
}

impl AlertServiceError {
    /// Client errors are caused by the request; everything else is a fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidCandidate { .. } | Self::NotFound(_))
    }
}

impl Display for AlertServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCandidate { index, source } => {
                write!(f, "invalid alert candidate #{index}: {source}")
            }
            Self::NotFound(id) => write!(f, "alert {id} does not exist"),
            Self::ConflictRetriesExhausted { attempts } => write!(
                f,
                "gave up after {attempts} attempt(s) due to concurrent writers; retry later"
            ),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AlertServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidCandidate { source, .. } => Some(source),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventLogError> for AlertServiceError {
    fn from(value: EventLogError) -> Self {
        Self::Storage(value)
    }
}

/// Alert lifecycle service over an event log and a notifier.
pub struct AlertService<L: EventLog, N: Notifier> {
    log: L,
    notifier: N,
    max_active_alerts: usize,
    max_write_attempts: u32,
    api_endpoint: Option<String>,
}

impl<L: EventLog, N: Notifier> AlertService<L, N> {
    pub fn new(log: L, notifier: N, config: &AlertManagerConfig) -> Self {
        Self {
            log,
            notifier,
            max_active_alerts: config.max_active_alerts,
            max_write_attempts: config.max_write_attempts,
            api_endpoint: config.api_endpoint.clone(),
        }
    }

    /// Replays the stream into a fresh projection.
    pub fn current_state(&self) -> Result<AlertState, AlertServiceError> {
        Ok(AlertState::load(&self.log)?)
    }

    /// Lists active alerts ordered by identity.
    pub fn list_active_alerts(&self) -> Result<Vec<Alert>, AlertServiceError> {
        Ok(self.current_state()?.active_alerts())
    }

    /// Ingests a batch; returns whether any alert was committed.
    ///
    /// Dropped duplicates and over-capacity candidates are not errors.
    pub fn ingest(&self, candidates: &[AlertCandidate]) -> Result<bool, AlertServiceError> {
        Ok(!self.ingest_committed(candidates)?.is_empty())
    }

    pub fn ingest_one(&self, candidate: AlertCandidate) -> Result<bool, AlertServiceError> {
        self.ingest(std::slice::from_ref(&candidate))
    }

    /// Ingests a batch and returns the alerts that were committed.
    pub fn ingest_committed(
        &self,
        candidates: &[AlertCandidate],
    ) -> Result<Vec<Alert>, AlertServiceError> {
        for (index, candidate) in candidates.iter().enumerate() {
            candidate
                .validate()
                .map_err(|source| AlertServiceError::InvalidCandidate { index, source })?;
        }
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let max_active = self.max_active_alerts;
        let result = transact_write(&self.log, self.max_write_attempts, "alert_ingest", |state| {
            let alerts = assign_identities(dedup_and_rate_limit(candidates, state, max_active), state);
            let events = alerts
                .iter()
                .map(|alert| {
                    NewEvent::alert_raised(
                        alert.id,
                        alert.subject.as_str(),
                        alert.details.as_str(),
                        EventMeta::system(alert.timestamp),
                    )
                })
                .collect();
            Ok(WritePlan {
                events,
                outcome: alerts,
            })
        });

        let result = match result {
            Ok(result) => result,
            Err(err) => {
                error!(
                    "event=alert_ingest module=service status=error stream={} candidates={} error={}",
                    self.log.stream(),
                    candidates.len(),
                    err
                );
                return Err(err);
            }
        };

        if !result.committed {
            info!(
                "event=alert_ingest module=service status=skipped stream={} candidates={} accepted=0 attempts={}",
                self.log.stream(),
                candidates.len(),
                result.attempts
            );
            return Ok(Vec::new());
        }

        info!(
            "event=alert_ingest module=service status=ok stream={} candidates={} accepted={} attempts={}",
            self.log.stream(),
            candidates.len(),
            result.outcome.len(),
            result.attempts
        );
        for alert in &result.outcome {
            self.publish(alert);
        }
        Ok(result.outcome)
    }

    /// Acknowledges an active alert.
    ///
    /// An alert acknowledged concurrently surfaces as `NotFound` on retry.
    pub fn acknowledge(&self, id: AlertId, actor: Actor) -> Result<(), AlertServiceError> {
        let meta = EventMeta {
            timestamp: Utc::now(),
            actor,
        };
        let result = transact_write(&self.log, self.max_write_attempts, "alert_ack", |state| {
            let Some(alert) = state.get(id) else {
                return Err(AlertServiceError::NotFound(id));
            };
            Ok(WritePlan {
                events: vec![NewEvent::alert_acknowledged(id, meta.clone())],
                outcome: alert.subject.clone(),
            })
        });

        match result {
            Ok(result) => {
                info!(
                    "event=alert_ack module=service status=ok stream={} alert_key={} subject={} attempts={}",
                    self.log.stream(),
                    id,
                    result.outcome,
                    result.attempts
                );
                Ok(())
            }
            Err(AlertServiceError::NotFound(id)) => {
                warn!(
                    "event=alert_ack module=service status=error stream={} alert_key={} error_code=not_found",
                    self.log.stream(),
                    id
                );
                Err(AlertServiceError::NotFound(id))
            }
            Err(err) => {
                error!(
                    "event=alert_ack module=service status=error stream={} alert_key={} error={}",
                    self.log.stream(),
                    id,
                    err
                );
                Err(err)
            }
        }
    }

    fn publish(&self, alert: &Alert) {
        let notification = AlertNotification::for_alert(alert, self.api_endpoint.as_deref());
        if let Err(err) = self.notifier.notify(&notification) {
            error!(
                "event=alert_notification module=service status=error alert_key={} error={}",
                alert.id, err
            );
        }
    }
}

/// Filters candidates by capacity and subject uniqueness, in input order.
///
/// A candidate is dropped when accepting it would exceed `max_active_alerts`
/// or when its subject is already active or accepted earlier in the batch.
pub fn dedup_and_rate_limit<'a>(
    candidates: &'a [AlertCandidate],
    state: &AlertState,
    max_active_alerts: usize,
) -> Vec<&'a AlertCandidate> {
    let active_count = state.active_count();
    let mut accepted: Vec<&AlertCandidate> = Vec::new();
    let mut accepted_subjects: HashSet<&str> = HashSet::new();

    for candidate in candidates {
        if active_count + accepted.len() >= max_active_alerts {
            continue;
        }

        let subject = candidate.subject.as_str();
        if state.find_by_subject(subject).is_some() || accepted_subjects.contains(subject) {
            continue;
        }

        accepted_subjects.insert(subject);
        accepted.push(candidate);
    }

    accepted
}

/// Gives each accepted candidate the version its event will be stored at.
///
/// Timestamps are cut to the stored precision so the returned and notified
/// alerts equal what a later read of the log yields.
fn assign_identities(accepted: Vec<&AlertCandidate>, state: &AlertState) -> Vec<Alert> {
    accepted
        .into_iter()
        .zip(state.version() + 1..)
        .map(|(candidate, version)| Alert {
            id: AlertId(version),
            subject: candidate.subject.clone(),
            details: candidate.details.clone(),
            timestamp: candidate.timestamp.trunc_subsecs(STORED_SUBSEC_DIGITS),
        })
        .collect()
}
