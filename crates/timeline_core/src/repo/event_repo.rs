//! Event repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Run create/update/delete as single all-or-nothing transactions:
//!   validate categories, check conflicts, write the row, replace associations.
//! - Provide hydrated read access (`get_event`, `list_events`).
//!
//! # Invariants
//! - Every mutation opens `BEGIN IMMEDIATE`, taking the database write lock
//!   before the conflict read. Two writers never both pass the check.
//! - The `events_overlap_guard_*` triggers are the storage backstop; their
//!   rejection is reported as `OverlapConflict`, never as a raw DB error.
//! - Any early return drops the `Transaction`, which rolls it back.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::functions::register_sql_functions;
use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::category::CategoryId;
use crate::model::event::{validate_interval, Event, EventDraft, EventId, EventValidationError};
use crate::repo::association::{load_event_categories, replace_associations};
use crate::repo::category_repo::validate_categories;
use crate::repo::conflict::{find_conflicts, has_conflict};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub(crate) const EVENT_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    description,
    start_ms,
    end_ms
FROM events";

/// Message raised by the overlap guard triggers.
pub const OVERLAP_GUARD_MESSAGE: &str = "event_overlap";

const EVENTS_DEFAULT_LIMIT: u32 = 10;
const EVENTS_LIMIT_MAX: u32 = 100;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for timeline persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Draft violates structural event invariants.
    Validation(EventValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Update/delete target does not exist.
    EventNotFound(EventId),
    /// Requested category ids that do not exist, sorted.
    CategoryNotFound(Vec<CategoryId>),
    /// Candidate interval intersects these persisted events.
    OverlapConflict(Vec<Event>),
    /// Category name is blank after trim.
    BlankCategoryName,
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::EventNotFound(id) => write!(f, "event not found: {id}"),
            Self::CategoryNotFound(ids) => {
                write!(f, "categories not found: {}", join_ids(ids))
            }
            Self::OverlapConflict(events) => write!(
                f,
                "time slot overlaps {} existing event(s): {}",
                events.len(),
                join_ids(&events.iter().map(|event| event.id).collect::<Vec<_>>())
            ),
            Self::BlankCategoryName => write!(f, "category name must not be blank"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "timeline repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "timeline repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "timeline repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted timeline data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for RepoError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventListQuery {
    /// Matches events carrying any of these categories. Empty means no filter.
    pub category_ids: Vec<CategoryId>,
    /// Maximum rows to return. Defaults to 10 and clamps to 100.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// One page of events ordered by `start_ms ASC`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EventPage {
    pub items: Vec<Event>,
    /// Matching rows before pagination.
    pub total: u64,
    /// Effective normalized limit.
    pub limit: u32,
    pub offset: u32,
}

/// Repository interface for event mutations and reads.
pub trait EventRepository {
    /// Inserts a new event with its associations in one transaction.
    fn create_event(&mut self, draft: &EventDraft) -> RepoResult<Event>;
    /// Fully replaces an existing event and its associations in one transaction.
    fn update_event(&mut self, event_id: EventId, draft: &EventDraft) -> RepoResult<Event>;
    /// Deletes an event and its associations unconditionally.
    fn delete_event(&mut self, event_id: EventId) -> RepoResult<()>;
    /// Gets one hydrated event by id.
    fn get_event(&self, event_id: EventId) -> RepoResult<Option<Event>>;
    /// Lists events using category filter + pagination.
    fn list_events(&self, query: &EventListQuery) -> RepoResult<EventPage>;
    /// Advisory conflict listing outside any write transaction.
    fn find_conflicts(
        &self,
        start_ms: i64,
        end_ms: i64,
        exclude: Option<EventId>,
    ) -> RepoResult<Vec<Event>>;
    /// Advisory conflict existence check outside any write transaction.
    fn has_conflict(&self, start_ms: i64, end_ms: i64, exclude: Option<EventId>)
        -> RepoResult<bool>;
}

/// SQLite-backed event repository.
pub struct SqliteEventRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteEventRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    ///
    /// Registers the `overlaps` SQL function on the connection so that both
    /// queries and the overlap guard triggers can run.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        register_sql_functions(conn)?;
        Ok(Self { conn })
    }
}

impl EventRepository for SqliteEventRepository<'_> {
    fn create_event(&mut self, draft: &EventDraft) -> RepoResult<Event> {
        draft.validate()?;
        let event_id = Uuid::new_v4();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        validate_categories(&tx, &draft.category_ids)?;
        ensure_no_conflict(&tx, draft.start_ms, draft.end_ms, None)?;

        let inserted = tx.execute(
            "INSERT INTO events (uuid, name, description, start_ms, end_ms)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                event_id.to_string(),
                draft.name.as_str(),
                draft.description.as_deref(),
                draft.start_ms,
                draft.end_ms,
            ],
        );
        map_guarded_write(&tx, inserted, draft, None)?;
        replace_associations(&tx, event_id, &draft.category_ids)?;

        let event = load_event(&tx, event_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("created event {event_id} missing in read-back"))
        })?;
        tx.commit()?;
        Ok(event)
    }

    fn update_event(&mut self, event_id: EventId, draft: &EventDraft) -> RepoResult<Event> {
        draft.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !event_exists(&tx, event_id)? {
            return Err(RepoError::EventNotFound(event_id));
        }
        validate_categories(&tx, &draft.category_ids)?;
        ensure_no_conflict(&tx, draft.start_ms, draft.end_ms, Some(event_id))?;

        let updated = tx.execute(
            "UPDATE events
             SET
                name = ?2,
                description = ?3,
                start_ms = ?4,
                end_ms = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                event_id.to_string(),
                draft.name.as_str(),
                draft.description.as_deref(),
                draft.start_ms,
                draft.end_ms,
            ],
        );
        if map_guarded_write(&tx, updated, draft, Some(event_id))? == 0 {
            return Err(RepoError::EventNotFound(event_id));
        }
        replace_associations(&tx, event_id, &draft.category_ids)?;

        let event = load_event(&tx, event_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("updated event {event_id} missing in read-back"))
        })?;
        tx.commit()?;
        Ok(event)
    }

    fn delete_event(&mut self, event_id: EventId) -> RepoResult<()> {
        let event_text = event_id.to_string();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "DELETE FROM event_categories WHERE event_uuid = ?1;",
            [event_text.as_str()],
        )?;
        let changed = tx.execute(
            "DELETE FROM events WHERE uuid = ?1;",
            [event_text.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::EventNotFound(event_id));
        }

        tx.commit()?;
        Ok(())
    }

    fn get_event(&self, event_id: EventId) -> RepoResult<Option<Event>> {
        load_event(&*self.conn, event_id)
    }

    fn list_events(&self, query: &EventListQuery) -> RepoResult<EventPage> {
        let mut where_sql = String::from(" WHERE 1 = 1");
        let mut filter_values: Vec<Value> = Vec::new();

        if !query.category_ids.is_empty() {
            let placeholders = vec!["?"; query.category_ids.len()].join(", ");
            where_sql.push_str(&format!(
                " AND EXISTS (
                    SELECT 1
                    FROM event_categories ec
                    WHERE ec.event_uuid = events.uuid
                      AND ec.category_uuid IN ({placeholders})
                )"
            ));
            filter_values.extend(
                query
                    .category_ids
                    .iter()
                    .map(|id| Value::Text(id.to_string())),
            );
        }

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM events{where_sql};"),
            params_from_iter(filter_values.iter()),
            |row| row.get(0),
        )?;

        let limit = normalize_event_limit(query.limit);
        let mut bind_values = filter_values;
        bind_values.push(Value::Integer(i64::from(limit)));
        bind_values.push(Value::Integer(i64::from(query.offset)));

        let mut stmt = self.conn.prepare(&format!(
            "{EVENT_SELECT_SQL}{where_sql}
             ORDER BY start_ms ASC, rowid ASC
             LIMIT ? OFFSET ?;"
        ))?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_event_row(&*self.conn, row)?);
        }

        Ok(EventPage {
            items,
            total: u64::try_from(total).map_err(|_| {
                RepoError::InvalidData(format!("negative event count `{total}`"))
            })?,
            limit,
            offset: query.offset,
        })
    }

    fn find_conflicts(
        &self,
        start_ms: i64,
        end_ms: i64,
        exclude: Option<EventId>,
    ) -> RepoResult<Vec<Event>> {
        find_conflicts(&*self.conn, start_ms, end_ms, exclude)
    }

    fn has_conflict(
        &self,
        start_ms: i64,
        end_ms: i64,
        exclude: Option<EventId>,
    ) -> RepoResult<bool> {
        has_conflict(&*self.conn, start_ms, end_ms, exclude)
    }
}

/// Normalizes list limit according to the events contract.
pub fn normalize_event_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => EVENTS_DEFAULT_LIMIT,
        Some(value) if value > EVENTS_LIMIT_MAX => EVENTS_LIMIT_MAX,
        Some(value) => value,
        None => EVENTS_DEFAULT_LIMIT,
    }
}

/// Returns whether `err` is the overlap guard trigger rejecting a write.
pub fn is_overlap_guard_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, Some(message))
            if inner.code == ErrorCode::ConstraintViolation && message == OVERLAP_GUARD_MESSAGE
    )
}

fn ensure_no_conflict(
    tx: &Transaction<'_>,
    start_ms: i64,
    end_ms: i64,
    exclude: Option<EventId>,
) -> RepoResult<()> {
    if has_conflict(tx, start_ms, end_ms, exclude)? {
        return Err(RepoError::OverlapConflict(find_conflicts(
            tx, start_ms, end_ms, exclude,
        )?));
    }
    Ok(())
}

fn map_guarded_write(
    tx: &Transaction<'_>,
    result: rusqlite::Result<usize>,
    draft: &EventDraft,
    exclude: Option<EventId>,
) -> RepoResult<usize> {
    match result {
        Ok(changed) => Ok(changed),
        Err(err) if is_overlap_guard_violation(&err) => Err(RepoError::OverlapConflict(
            find_conflicts(tx, draft.start_ms, draft.end_ms, exclude)?,
        )),
        Err(err) => Err(err.into()),
    }
}

fn event_exists(tx: &Transaction<'_>, event_id: EventId) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM events WHERE uuid = ?1);",
        [event_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn load_event(conn: &Connection, event_id: EventId) -> RepoResult<Option<Event>> {
    let mut stmt = conn.prepare(&format!("{EVENT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([event_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_event_row(conn, row)?));
    }
    Ok(None)
}

pub(crate) fn parse_event_row(conn: &Connection, row: &Row<'_>) -> RepoResult<Event> {
    let uuid_text: String = row.get("uuid")?;
    let id = parse_uuid(&uuid_text, "events.uuid")?;
    let start_ms: i64 = row.get("start_ms")?;
    let end_ms: i64 = row.get("end_ms")?;
    validate_interval(start_ms, end_ms).map_err(|_| {
        RepoError::InvalidData(format!(
            "event {id} has inverted interval [{start_ms}, {end_ms})"
        ))
    })?;

    Ok(Event {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        start_ms,
        end_ms,
        categories: load_event_categories(conn, id)?,
    })
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 3] = [
        ("categories", &["uuid", "name"]),
        (
            "events",
            &["uuid", "name", "description", "start_ms", "end_ms"],
        ),
        ("event_categories", &["event_uuid", "category_uuid"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{is_overlap_guard_violation, map_guarded_write, normalize_event_limit, RepoError};
    use crate::db::open_db_in_memory;
    use crate::model::event::EventDraft;
    use rusqlite::{params, TransactionBehavior};
    use uuid::Uuid;

    #[test]
    fn limit_defaults_to_10_and_caps_at_100() {
        assert_eq!(normalize_event_limit(None), 10);
        assert_eq!(normalize_event_limit(Some(0)), 10);
        assert_eq!(normalize_event_limit(Some(25)), 25);
        assert_eq!(normalize_event_limit(Some(1_000)), 100);
    }

    #[test]
    fn overlap_guard_rejection_is_recognized() {
        let conn = open_db_in_memory().unwrap();
        conn.execute(
            "INSERT INTO events (uuid, name, start_ms, end_ms)
             VALUES ('00000000-0000-4000-8000-000000000001', 'a', 100, 200);",
            [],
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO events (uuid, name, start_ms, end_ms)
                 VALUES ('00000000-0000-4000-8000-000000000002', 'b', 150, 250);",
                [],
            )
            .unwrap_err();
        assert!(is_overlap_guard_violation(&err));
    }

    #[test]
    fn unrelated_constraint_failure_is_not_an_overlap() {
        let conn = open_db_in_memory().unwrap();
        let err = conn
            .execute(
                "INSERT INTO events (uuid, name, start_ms, end_ms)
                 VALUES ('00000000-0000-4000-8000-000000000001', 'a', 200, 100);",
                [],
            )
            .unwrap_err();
        assert!(!is_overlap_guard_violation(&err));
    }

    #[test]
    fn guarded_write_maps_trigger_rejection_to_overlap_conflict() {
        let mut conn = open_db_in_memory().unwrap();
        let existing = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
        let candidate = Uuid::parse_str("00000000-0000-4000-8000-000000000002").unwrap();
        let draft = EventDraft::new("b", 150, 250, Vec::new());

        {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .unwrap();
            tx.execute(
                "INSERT INTO events (uuid, name, start_ms, end_ms) VALUES (?1, 'a', 100, 200);",
                [existing.to_string()],
            )
            .unwrap();

            let rejected = tx.execute(
                "INSERT INTO events (uuid, name, start_ms, end_ms) VALUES (?1, ?2, ?3, ?4);",
                params![candidate.to_string(), draft.name, draft.start_ms, draft.end_ms],
            );
            match map_guarded_write(&tx, rejected, &draft, None) {
                Err(RepoError::OverlapConflict(conflicts)) => {
                    assert_eq!(
                        conflicts.iter().map(|event| event.id).collect::<Vec<_>>(),
                        vec![existing]
                    );
                    assert_eq!((conflicts[0].start_ms, conflicts[0].end_ms), (100, 200));
                }
                Err(other) => panic!("expected overlap conflict, got {other}"),
                Ok(changed) => panic!("expected trigger rejection, wrote {changed} row(s)"),
            }

            assert_eq!(map_guarded_write(&tx, Ok(1), &draft, None).unwrap(), 1);
        }

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
