//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Own the write transaction for every event mutation.
//!
//! # Invariants
//! - Event writes run inside one `BEGIN IMMEDIATE` transaction, so
//!   check-then-write sequences from different connections never interleave.
//! - Repository APIs return semantic errors (`EventNotFound`,
//!   `CategoryNotFound`, `OverlapConflict`) in addition to DB transport errors.

pub mod association;
pub mod category_repo;
pub mod conflict;
pub mod event_repo;
