//! Category reference data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Stable identifier of a category.
pub type CategoryId = Uuid;

/// Category names seeded into a fresh timeline.
pub const DEFAULT_CATEGORY_NAMES: &[&str] = &["Music", "Sports", "Tech", "Workshop", "Conference"];

/// Read-only category record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Unique display name, compared case-insensitively.
    pub name: String,
}

/// Deduplicates category ids into ascending order.
///
/// Input order carries no meaning: two requests naming the same set must
/// produce the same associations.
pub fn normalize_category_ids(ids: &[CategoryId]) -> Vec<CategoryId> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}
