//! Event domain model.
//!
//! # Responsibility
//! - Define the persisted event read model and the full-replace write model.
//! - Provide the structural checks the mutation path re-runs before writing.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `start_ms < end_ms` for every persisted event.
//! - `name` is never blank.

use crate::model::category::{Category, CategoryId};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of an event.
pub type EventId = Uuid;

/// Persisted event hydrated with its categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: Option<String>,
    /// Inclusive start, Unix epoch milliseconds.
    pub start_ms: i64,
    /// Exclusive end, Unix epoch milliseconds.
    pub end_ms: i64,
    /// Sorted by name (case-insensitive), then id.
    pub categories: Vec<Category>,
}

impl Event {
    /// Returns ids of the attached categories in their stored order.
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.categories.iter().map(|category| category.id).collect()
    }
}

/// Full-replace input for create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    pub name: String,
    pub description: Option<String>,
    pub start_ms: i64,
    pub end_ms: i64,
    /// Target association set. Order and duplicates are not significant.
    pub category_ids: Vec<CategoryId>,
}

impl EventDraft {
    pub fn new(
        name: impl Into<String>,
        start_ms: i64,
        end_ms: i64,
        category_ids: Vec<CategoryId>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            start_ms,
            end_ms,
            category_ids,
        }
    }

    /// Sets the optional description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Checks the structural invariants of the draft.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is blank after trim.
    /// - `InvalidInterval` when `start_ms >= end_ms`.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.name.trim().is_empty() {
            return Err(EventValidationError::EmptyName);
        }
        validate_interval(self.start_ms, self.end_ms)
    }
}

/// Rejects empty or inverted half-open intervals.
pub fn validate_interval(start_ms: i64, end_ms: i64) -> Result<(), EventValidationError> {
    if start_ms >= end_ms {
        return Err(EventValidationError::InvalidInterval { start_ms, end_ms });
    }
    Ok(())
}

/// Structural violation of the event invariants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventValidationError {
    EmptyName,
    InvalidInterval { start_ms: i64, end_ms: i64 },
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "event name must not be blank"),
            Self::InvalidInterval { start_ms, end_ms } => write!(
                f,
                "event start ({start_ms}) must be strictly before end ({end_ms})"
            ),
        }
    }
}

impl Error for EventValidationError {}

#[cfg(test)]
mod tests {
    use super::{EventDraft, EventValidationError};

    #[test]
    fn validate_accepts_well_formed_draft() {
        let draft = EventDraft::new("standup", 100, 200, Vec::new());
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_name() {
        let draft = EventDraft::new("   ", 100, 200, Vec::new());
        assert_eq!(draft.validate(), Err(EventValidationError::EmptyName));
    }

    #[test]
    fn validate_rejects_empty_and_inverted_intervals() {
        let empty = EventDraft::new("x", 100, 100, Vec::new());
        assert!(matches!(
            empty.validate(),
            Err(EventValidationError::InvalidInterval { .. })
        ));

        let inverted = EventDraft::new("x", 200, 100, Vec::new());
        assert_eq!(
            inverted.validate(),
            Err(EventValidationError::InvalidInterval {
                start_ms: 200,
                end_ms: 100
            })
        );
    }
}
