//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate projection reads and conditional appends into use cases.
//! - Keep CLI/transport layers decoupled from storage details.
//!
//! # Invariants
//! - Every state change goes through one read -> decide -> append cycle,
//!   retried a bounded number of times on concurrency conflicts.
//! - Notifications are sent only after a successful commit.

pub mod alert_service;
pub mod switch_service;
mod transact;

pub use alert_service::{dedup_and_rate_limit, AlertService, AlertServiceError};
pub use switch_service::{CheckinOutcome, SweepOutcome, SwitchService, SwitchServiceError};
