//! Outbound notification collaborator.
//!
//! # Invariants
//! - Notifiers run only after the alert is committed.
//! - A notifier failure never affects committed state.

use crate::model::alert::{Alert, AlertId};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Payload dispatched once per newly committed alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub alert_key: AlertId,
    pub subject: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_link: Option<String>,
}

impl AlertNotification {
    /// Builds the payload; `api_endpoint` enables the acknowledge link.
    pub fn for_alert(alert: &Alert, api_endpoint: Option<&str>) -> Self {
        Self {
            alert_key: alert.id,
            subject: alert.subject.clone(),
            details: alert.details.clone(),
            timestamp: alert.timestamp,
            ack_link: api_endpoint.map(|endpoint| ack_link(endpoint, alert.id)),
        }
    }
}

/// Link that acknowledges `id` when followed (e.g. from an email).
pub fn ack_link(api_endpoint: &str, id: AlertId) -> String {
    format!("{api_endpoint}/alerts/acknowledge?key={id}")
}

/// Delivery failure reported by a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationError {
    pub message: String,
}

impl NotificationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for NotificationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.message)
    }
}

impl Error for NotificationError {}

/// Fan-out hook for newly raised alerts.
pub trait Notifier {
    fn notify(&self, notification: &AlertNotification) -> Result<(), NotificationError>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, notification: &AlertNotification) -> Result<(), NotificationError> {
        (**self).notify(notification)
    }
}

/// Writes notifications to the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &AlertNotification) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(notification)
            .map_err(|err| NotificationError::new(format!("cannot encode payload: {err}")))?;
        info!(
            "event=alert_notification module=notify status=ok alert_key={} subject={}",
            notification.alert_key, notification.subject
        );
        debug!("event=alert_notification module=notify payload={payload}");
        Ok(())
    }
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _notification: &AlertNotification) -> Result<(), NotificationError> {
        Ok(())
    }
}
