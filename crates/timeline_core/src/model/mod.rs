//! Domain model for the single-track event timeline.
//!
//! # Responsibility
//! - Define canonical event/category records shared by repo and service.
//! - Own the interval predicate used by every conflict test.
//!
//! # Invariants
//! - Every event and category is identified by a stable UUID.
//! - Event intervals are half-open `[start_ms, end_ms)` with `start_ms < end_ms`.

pub mod category;
pub mod event;
pub mod interval;
