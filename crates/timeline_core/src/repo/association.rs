//! Event/category association persistence.
//!
//! # Responsibility
//! - Replace an event's association set with an exact target set.
//! - Hydrate the category list attached to one event.
//!
//! # Invariants
//! - Replacement only runs on a caller-owned open `Transaction`; it never
//!   commits, so an event is never visible with stale or empty categories.
//! - Replacement is full (delete all, insert target) and idempotent.

use crate::model::category::{normalize_category_ids, Category, CategoryId};
use crate::model::event::EventId;
use crate::repo::event_repo::{parse_uuid, RepoResult};
use rusqlite::{params, Connection, Transaction};

/// Makes the persisted association set of `event_id` exactly `target`.
pub fn replace_associations(
    tx: &Transaction<'_>,
    event_id: EventId,
    target: &[CategoryId],
) -> RepoResult<()> {
    let event_text = event_id.to_string();
    tx.execute(
        "DELETE FROM event_categories WHERE event_uuid = ?1;",
        [event_text.as_str()],
    )?;

    let mut insert = tx.prepare(
        "INSERT INTO event_categories (event_uuid, category_uuid)
         VALUES (?1, ?2);",
    )?;
    for category_id in normalize_category_ids(target) {
        insert.execute(params![event_text.as_str(), category_id.to_string()])?;
    }

    Ok(())
}

/// Loads categories attached to one event, sorted by name then id.
pub fn load_event_categories(conn: &Connection, event_id: EventId) -> RepoResult<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT c.uuid, c.name
         FROM event_categories ec
         INNER JOIN categories c ON c.uuid = ec.category_uuid
         WHERE ec.event_uuid = ?1
         ORDER BY c.name COLLATE NOCASE ASC, c.uuid ASC;",
    )?;
    let mut rows = stmt.query([event_id.to_string()])?;
    let mut categories = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get(0)?;
        categories.push(Category {
            id: parse_uuid(&uuid_text, "categories.uuid")?,
            name: row.get(1)?,
        });
    }
    Ok(categories)
}
