//! Alert-lifecycle engine.
//!
//! Alerts live in an append-only event stream; the set of active alerts is a
//! projection folded from it. Ingestion deduplicates and rate-limits
//! candidate alerts and commits them with one conditional append, and dead
//! man's switch check-ins auto-acknowledge the alert their lateness raised.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod projection;
pub mod repo;
pub mod service;

pub use config::{AlertManagerConfig, ConfigError};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::alert::{Alert, AlertCandidate, AlertId, AlertValidationError};
pub use model::event::{Actor, DomainEvent, EventMeta, EventRecord, NewEvent};
pub use model::switch::{
    switch_matches_alert, CheckinRequest, CheckinValidationError, DeadMansSwitch,
};
pub use model::ttl::{parse_ttl_spec, TtlParseError};
pub use notify::{AlertNotification, LogNotifier, NoopNotifier, NotificationError, Notifier};
pub use projection::AlertState;
pub use repo::event_log::{EventLog, EventLogError, EventLogResult};
pub use repo::memory_event_log::InMemoryEventLog;
pub use repo::sqlite_event_log::SqliteEventLog;
pub use repo::switch_repo::{RepoError, RepoResult, SqliteSwitchRepository, SwitchRepository};
pub use service::{
    dedup_and_rate_limit, AlertService, AlertServiceError, CheckinOutcome, SweepOutcome,
    SwitchService, SwitchServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
