//! Event mutation use-case service.
//!
//! # Responsibility
//! - Front the transactional event repository with use-case level APIs.
//! - Re-check structural invariants and apply `CategoryPolicy`.
//! - Translate repository failures into caller-dispatchable domain outcomes.
//! - Serve the advisory conflict preview.
//!
//! # Invariants
//! - Update is a full replace, never a partial patch.
//! - Expected outcomes (`CategoryNotFound`, `OverlapConflict`,
//!   `EventNotFound`) never surface as `Storage`.
//! - Storage failures are reported once and never retried here.

use crate::config::CategoryPolicy;
use crate::model::category::CategoryId;
use crate::model::event::{validate_interval, Event, EventDraft, EventId, EventValidationError};
use crate::repo::event_repo::{
    normalize_event_limit, EventListQuery, EventPage, EventRepository, RepoError,
};
use log::{error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Service error for event use-cases.
#[derive(Debug)]
pub enum EventServiceError {
    /// Draft reached the core violating structural invariants.
    InvalidDraft(EventValidationError),
    /// Draft names no category while `CategoryPolicy::RequireAtLeastOne` is active.
    EmptyCategorySet,
    /// Requested categories that do not exist.
    CategoryNotFound(Vec<CategoryId>),
    /// Candidate interval intersects these events.
    OverlapConflict(Vec<Event>),
    /// Update/delete target does not exist.
    EventNotFound(EventId),
    /// Transport/transaction-level persistence failure.
    Storage(RepoError),
}

impl EventServiceError {
    /// Stable machine-readable code used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDraft(_) => "invalid_draft",
            Self::EmptyCategorySet => "empty_category_set",
            Self::CategoryNotFound(_) => "category_not_found",
            Self::OverlapConflict(_) => "overlap_conflict",
            Self::EventNotFound(_) => "event_not_found",
            Self::Storage(_) => "storage_failure",
        }
    }

    /// Returns whether this is an expected, caller-recoverable outcome.
    pub fn is_domain_outcome(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl Display for EventServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDraft(err) => write!(f, "invalid event: {err}"),
            Self::EmptyCategorySet => write!(f, "at least one category is required"),
            Self::CategoryNotFound(ids) => write!(
                f,
                "invalid category ids: {}",
                ids.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::OverlapConflict(events) => write!(
                f,
                "time slot overlaps {} existing event(s)",
                events.len()
            ),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EventServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidDraft(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EventServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::InvalidDraft(err),
            RepoError::EventNotFound(id) => Self::EventNotFound(id),
            RepoError::CategoryNotFound(ids) => Self::CategoryNotFound(ids),
            RepoError::OverlapConflict(events) => Self::OverlapConflict(events),
            other => Self::Storage(other),
        }
    }
}

/// Advisory conflict preview result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub has_conflict: bool,
    /// Conflicting events ordered by start.
    pub conflicts: Vec<Event>,
}

impl ConflictReport {
    fn none() -> Self {
        Self {
            has_conflict: false,
            conflicts: Vec::new(),
        }
    }
}

/// Event service facade over repository implementations.
pub struct EventService<R: EventRepository> {
    repo: R,
    category_policy: CategoryPolicy,
}

impl<R: EventRepository> EventService<R> {
    /// Creates a service using the default `CategoryPolicy`.
    pub fn new(repo: R) -> Self {
        Self::with_policy(repo, CategoryPolicy::default())
    }

    /// Creates a service with an explicit zero-categories policy.
    pub fn with_policy(repo: R, category_policy: CategoryPolicy) -> Self {
        Self {
            repo,
            category_policy,
        }
    }

    /// Returns the active zero-categories policy.
    pub fn category_policy(&self) -> CategoryPolicy {
        self.category_policy
    }

    /// Creates one event and its category associations atomically.
    ///
    /// # Errors
    /// - `InvalidDraft`/`EmptyCategorySet` before any storage access.
    /// - `CategoryNotFound`, `OverlapConflict` with nothing written.
    /// - `Storage` for transport failures; the transaction is rolled back.
    pub fn create_event(&mut self, draft: EventDraft) -> Result<Event, EventServiceError> {
        let started_at = Instant::now();
        self.check_draft("event_create", &draft)?;

        match self.repo.create_event(&draft) {
            Ok(event) => {
                info!(
                    "event=event_create module=service status=ok event_id={} category_count={} duration_ms={}",
                    event.id,
                    event.categories.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(event)
            }
            Err(err) => Err(log_failure("event_create", None, err.into(), started_at)),
        }
    }

    /// Fully replaces one event's fields and category set atomically.
    ///
    /// The event's own current interval never counts as a conflict.
    pub fn update_event(
        &mut self,
        event_id: EventId,
        draft: EventDraft,
    ) -> Result<Event, EventServiceError> {
        let started_at = Instant::now();
        self.check_draft("event_update", &draft)?;

        match self.repo.update_event(event_id, &draft) {
            Ok(event) => {
                info!(
                    "event=event_update module=service status=ok event_id={} category_count={} duration_ms={}",
                    event.id,
                    event.categories.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(event)
            }
            Err(err) => Err(log_failure(
                "event_update",
                Some(event_id),
                err.into(),
                started_at,
            )),
        }
    }

    /// Deletes one event and its associations, with no overlap/category checks.
    ///
    /// A repeated delete reports `EventNotFound`.
    pub fn delete_event(&mut self, event_id: EventId) -> Result<(), EventServiceError> {
        let started_at = Instant::now();
        match self.repo.delete_event(event_id) {
            Ok(()) => {
                info!(
                    "event=event_delete module=service status=ok event_id={} duration_ms={}",
                    event_id,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => Err(log_failure(
                "event_delete",
                Some(event_id),
                err.into(),
                started_at,
            )),
        }
    }

    /// Gets one event by stable ID.
    pub fn get_event(&self, event_id: EventId) -> Result<Option<Event>, EventServiceError> {
        Ok(self.repo.get_event(event_id)?)
    }

    /// Lists events matching any of `category_ids`, paginated by start time.
    pub fn list_events(
        &self,
        category_ids: Vec<CategoryId>,
        limit: Option<u32>,
        offset: u32,
    ) -> Result<EventPage, EventServiceError> {
        let query = EventListQuery {
            category_ids,
            limit: Some(normalize_event_limit(limit)),
            offset,
        };
        Ok(self.repo.list_events(&query)?)
    }

    /// Advisory conflict preview with no transactional guarantee.
    ///
    /// A missing bound means "no proposed interval" and reports no conflict.
    pub fn check_conflicts(
        &self,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
        exclude: Option<EventId>,
    ) -> Result<ConflictReport, EventServiceError> {
        let (Some(start_ms), Some(end_ms)) = (start_ms, end_ms) else {
            return Ok(ConflictReport::none());
        };
        validate_interval(start_ms, end_ms).map_err(EventServiceError::InvalidDraft)?;

        let conflicts = self.repo.find_conflicts(start_ms, end_ms, exclude)?;
        Ok(ConflictReport {
            has_conflict: !conflicts.is_empty(),
            conflicts,
        })
    }

    /// Advisory existence-only conflict check.
    pub fn has_conflict(
        &self,
        start_ms: i64,
        end_ms: i64,
        exclude: Option<EventId>,
    ) -> Result<bool, EventServiceError> {
        validate_interval(start_ms, end_ms).map_err(EventServiceError::InvalidDraft)?;
        Ok(self.repo.has_conflict(start_ms, end_ms, exclude)?)
    }

    fn check_draft(&self, event: &str, draft: &EventDraft) -> Result<(), EventServiceError> {
        let result = match draft.validate() {
            Err(err) => Err(EventServiceError::InvalidDraft(err)),
            Ok(()) if draft.category_ids.is_empty()
                && self.category_policy == CategoryPolicy::RequireAtLeastOne =>
            {
                Err(EventServiceError::EmptyCategorySet)
            }
            Ok(()) => Ok(()),
        };

        if let Err(err) = &result {
            warn!(
                "event={} module=service status=rejected error_code={} policy={}",
                event,
                err.code(),
                self.category_policy.as_str()
            );
        }
        result
    }
}

fn log_failure(
    event: &str,
    event_id: Option<EventId>,
    err: EventServiceError,
    started_at: Instant,
) -> EventServiceError {
    let target = event_id.map_or_else(|| "-".to_string(), |id| id.to_string());
    let detail_count = match &err {
        EventServiceError::CategoryNotFound(ids) => ids.len(),
        EventServiceError::OverlapConflict(events) => events.len(),
        _ => 0,
    };

    if err.is_domain_outcome() {
        warn!(
            "event={} module=service status=rejected event_id={} error_code={} detail_count={} duration_ms={}",
            event,
            target,
            err.code(),
            detail_count,
            started_at.elapsed().as_millis()
        );
    } else {
        error!(
            "event={} module=service status=error event_id={} error_code={} duration_ms={} error={}",
            event,
            target,
            err.code(),
            started_at.elapsed().as_millis(),
            err
        );
    }
    err
}
