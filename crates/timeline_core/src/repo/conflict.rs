//! Conflict finder over the persisted timeline.
//!
//! # Responsibility
//! - List every event whose interval intersects a candidate interval.
//! - Answer the cheaper existence question for the write path.
//!
//! # Invariants
//! - Read-only; safe outside any write transaction (advisory mode) and inside
//!   one (`Transaction` derefs to `Connection`).
//! - Intersection is decided by the `overlaps` SQL function only. The
//!   `start_ms < ?2` term is a necessary condition that lets SQLite range-scan
//!   `idx_events_start_end` instead of calling `overlaps` on every row.
//! - Results are ordered by `start_ms ASC`, ties by insertion order.
//! - Callers guarantee `start_ms < end_ms`; no re-validation happens here.

use crate::model::event::{Event, EventId};
use crate::repo::event_repo::{parse_event_row, RepoResult, EVENT_SELECT_SQL};
use rusqlite::{params, Connection};

pub(crate) const HAS_CONFLICT_SQL: &str = "SELECT EXISTS(
    SELECT 1
    FROM events
    WHERE start_ms < ?2
      AND overlaps(start_ms, end_ms, ?1, ?2)
      AND (?3 IS NULL OR uuid <> ?3)
);";

/// Returns all events intersecting `[start_ms, end_ms)`, minus `exclude`.
pub fn find_conflicts(
    conn: &Connection,
    start_ms: i64,
    end_ms: i64,
    exclude: Option<EventId>,
) -> RepoResult<Vec<Event>> {
    let exclude_text = exclude.map(|id| id.to_string());
    let mut stmt = conn.prepare(&format!(
        "{EVENT_SELECT_SQL}
         WHERE start_ms < ?2
           AND overlaps(start_ms, end_ms, ?1, ?2)
           AND (?3 IS NULL OR uuid <> ?3)
         ORDER BY start_ms ASC, rowid ASC;"
    ))?;

    let mut rows = stmt.query(params![start_ms, end_ms, exclude_text])?;
    let mut conflicts = Vec::new();
    while let Some(row) = rows.next()? {
        conflicts.push(parse_event_row(conn, row)?);
    }

    Ok(conflicts)
}

/// Returns whether any event other than `exclude` intersects the interval.
pub fn has_conflict(
    conn: &Connection,
    start_ms: i64,
    end_ms: i64,
    exclude: Option<EventId>,
) -> RepoResult<bool> {
    let exclude_text = exclude.map(|id| id.to_string());
    let exists: i64 = conn.query_row(
        HAS_CONFLICT_SQL,
        params![start_ms, end_ms, exclude_text],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
