//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the append-only `EventLog` contract with optimistic concurrency.
//! - Provide SQLite and in-memory event log backends.
//! - Own the last-write-wins dead man's switch table.
//!
//! # Invariants
//! - `EventLog::append` is the only mutation path for alert state.
//! - Backends return semantic errors (`ConcurrencyConflict`) in addition to
//!   transport errors, and reject malformed persisted rows.

pub mod event_log;
pub mod memory_event_log;
pub mod sqlite_event_log;
pub mod switch_repo;
