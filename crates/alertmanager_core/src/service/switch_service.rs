//! Dead man's switch use cases.
//!
//! # Responsibility
//! - Record check-ins (last-write-wins per subject).
//! - Auto-acknowledge the alert a late switch raised once it checks in.
//! - Turn expired switches into alert candidates for the ingestion pipeline.
//!
//! # Invariants
//! - Invalid check-in input mutates nothing.
//! - A check-in never appends to the event log unless a matching alert is
//!   active.

use crate::model::alert::{Alert, AlertId};
use crate::model::event::Actor;
use crate::model::switch::{
    switch_matches_alert, CheckinRequest, CheckinValidationError, DeadMansSwitch,
};
use crate::notify::Notifier;
use crate::repo::event_log::EventLog;
use crate::repo::switch_repo::{RepoError, SwitchRepository};
use crate::service::alert_service::{AlertService, AlertServiceError};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from switch use cases.
#[derive(Debug)]
pub enum SwitchServiceError {
    InvalidInput(CheckinValidationError),
    Repo(RepoError),
    Alerts(AlertServiceError),
}

impl SwitchServiceError {
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::Repo(_) => false,
            Self::Alerts(err) => err.is_client_error(),
        }
    }
}

impl Display for SwitchServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Alerts(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SwitchServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Alerts(err) => Some(err),
        }
    }
}

impl From<CheckinValidationError> for SwitchServiceError {
    fn from(value: CheckinValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<RepoError> for SwitchServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AlertServiceError> for SwitchServiceError {
    fn from(value: AlertServiceError) -> Self {
        Self::Alerts(value)
    }
}

/// Result of one check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinOutcome {
    /// Switch as persisted.
    pub switch: DeadMansSwitch,
    /// Alert this check-in acknowledged, if one was firing.
    pub acknowledged: Option<AlertId>,
}

impl CheckinOutcome {
    pub fn auto_acknowledged(&self) -> bool {
        self.acknowledged.is_some()
    }
}

/// Result of one expired-switch sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Subjects of switches past their TTL, ordered by subject.
    pub expired: Vec<String>,
    /// Alerts newly raised by this sweep.
    pub raised: Vec<Alert>,
}

/// Switch service; acknowledgments and alerts go through `AlertService`.
pub struct SwitchService<'a, L: EventLog, N: Notifier, S: SwitchRepository> {
    alerts: &'a AlertService<L, N>,
    switches: S,
}

impl<'a, L: EventLog, N: Notifier, S: SwitchRepository> SwitchService<'a, L, N, S> {
    pub fn new(alerts: &'a AlertService<L, N>, switches: S) -> Self {
        Self { alerts, switches }
    }

    /// Lists all switches ordered by subject.
    pub fn list_switches(&self) -> Result<Vec<DeadMansSwitch>, SwitchServiceError> {
        Ok(self.switches.list_switches()?)
    }

    /// Records a check-in and acknowledges the switch's firing alert.
    pub fn check_in(
        &self,
        request: &CheckinRequest,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, SwitchServiceError> {
        let switch = match request.resolve(now) {
            Ok(switch) => switch,
            Err(err) => {
                warn!(
                    "event=switch_checkin module=service status=error error_code=invalid_input error={err}"
                );
                return Err(err.into());
            }
        };

        if let Err(err) = self.switches.put_switch(&switch) {
            error!(
                "event=switch_checkin module=service status=error subject={} error_code=switch_write_failed error={}",
                switch.subject, err
            );
            return Err(err.into());
        }

        let firing = self
            .alerts
            .current_state()?
            .active_alerts()
            .into_iter()
            .find(|alert| switch_matches_alert(&switch, alert));

        let acknowledged = match firing {
            None => None,
            Some(alert) => match self.alerts.acknowledge(alert.id, Actor::System) {
                Ok(()) => Some(alert.id),
                Err(AlertServiceError::NotFound(id)) => {
                    info!(
                        "event=switch_checkin module=service status=ok subject={} alert_key={id} reason=already_acknowledged",
                        switch.subject
                    );
                    None
                }
                Err(err) => return Err(err.into()),
            },
        };

        info!(
            "event=switch_checkin module=service status=ok subject={} ttl={} auto_acknowledged={}",
            switch.subject,
            switch.ttl.to_rfc3339(),
            acknowledged.is_some()
        );
        Ok(CheckinOutcome {
            switch,
            acknowledged,
        })
    }

    /// Raises alerts for every switch whose TTL has passed at `now`.
    ///
    /// Goes through normal ingestion, so a switch whose alert is still
    /// active does not fire again and the capacity bound applies.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepOutcome, SwitchServiceError> {
        let expired: Vec<DeadMansSwitch> = self
            .switches
            .list_switches()?
            .into_iter()
            .filter(|switch| switch.is_expired(now))
            .collect();

        let candidates: Vec<_> = expired.iter().map(|switch| switch.as_candidate(now)).collect();
        let raised = self.alerts.ingest_committed(&candidates)?;

        info!(
            "event=switch_sweep module=service status=ok expired={} raised={}",
            expired.len(),
            raised.len()
        );
        Ok(SweepOutcome {
            expired: expired.into_iter().map(|switch| switch.subject).collect(),
            raised,
        })
    }
}
