//! Core domain logic for the single-track event timeline.
//! This crate is the single source of truth for the no-overlap invariant.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{CategoryPolicy, ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::category::{Category, CategoryId, DEFAULT_CATEGORY_NAMES};
pub use model::event::{Event, EventDraft, EventId, EventValidationError};
pub use model::interval::overlaps;
pub use repo::category_repo::{CategoryRepository, SqliteCategoryRepository};
pub use repo::event_repo::{
    EventListQuery, EventPage, EventRepository, RepoError, RepoResult, SqliteEventRepository,
};
pub use service::event_service::{ConflictReport, EventService, EventServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
