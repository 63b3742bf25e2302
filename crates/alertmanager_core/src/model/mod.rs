//! Typed domain values for the alert engine.
//!
//! # Responsibility
//! - Define alerts, candidates, domain events and dead man's switches.
//! - Keep validation and derived shapes next to the data they guard.
//!
//! # Invariants
//! - An `AlertId` is the stream version of the event that raised the alert.
//! - Events are immutable once they carry a version.

pub mod alert;
pub mod event;
pub mod switch;
pub mod ttl;

/// Fractional-second digits that survive storage (epoch milliseconds).
pub const STORED_SUBSEC_DIGITS: u16 = 3;
