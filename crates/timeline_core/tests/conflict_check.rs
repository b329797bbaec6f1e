use rusqlite::Connection;
use timeline_core::db::open_db_in_memory;
use timeline_core::{
    CategoryId, CategoryRepository, EventDraft, EventService, EventServiceError,
    SqliteCategoryRepository, SqliteEventRepository,
};

const HOUR_MS: i64 = 60 * 60 * 1000;
const BASE_MS: i64 = 1_704_067_200_000;

fn hours(value: i64) -> i64 {
    BASE_MS + value * HOUR_MS
}

fn conn_with_category() -> (Connection, CategoryId) {
    let mut conn = open_db_in_memory().unwrap();
    let category = SqliteCategoryRepository::try_new(&mut conn)
        .unwrap()
        .ensure_category("Conference")
        .unwrap();
    (conn, category.id)
}

#[test]
fn missing_bounds_report_no_conflict() {
    let (mut conn, category) = conn_with_category();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    service
        .create_event(EventDraft::new("busy", hours(0), hours(24), vec![category]))
        .unwrap();

    for (start, end) in [(None, None), (Some(hours(1)), None), (None, Some(hours(2)))] {
        let report = service.check_conflicts(start, end, None).unwrap();
        assert!(!report.has_conflict);
        assert!(report.conflicts.is_empty());
    }
}

#[test]
fn reports_conflicts_in_start_order() {
    let (mut conn, category) = conn_with_category();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    let second = service
        .create_event(EventDraft::new("second", hours(5), hours(6), vec![category]))
        .unwrap();
    let first = service
        .create_event(EventDraft::new("first", hours(2), hours(3), vec![category]))
        .unwrap();

    let report = service
        .check_conflicts(Some(hours(1)), Some(hours(10)), None)
        .unwrap();
    assert!(report.has_conflict);
    assert_eq!(report.conflicts, vec![first, second]);
}

#[test]
fn touching_intervals_are_not_conflicts() {
    let (mut conn, category) = conn_with_category();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    service
        .create_event(EventDraft::new("slot", hours(2), hours(3), vec![category]))
        .unwrap();

    let before = service
        .check_conflicts(Some(hours(1)), Some(hours(2)), None)
        .unwrap();
    let after = service
        .check_conflicts(Some(hours(3)), Some(hours(4)), None)
        .unwrap();
    assert!(!before.has_conflict);
    assert!(!after.has_conflict);
    assert!(!service.has_conflict(hours(3), hours(4), None).unwrap());
    assert!(service.has_conflict(hours(2), hours(4), None).unwrap());
}

#[test]
fn excluded_event_is_ignored() {
    let (mut conn, category) = conn_with_category();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    let own = service
        .create_event(EventDraft::new("own", hours(2), hours(4), vec![category]))
        .unwrap();
    let neighbour = service
        .create_event(EventDraft::new("neighbour", hours(4), hours(5), vec![category]))
        .unwrap();

    let report = service
        .check_conflicts(Some(hours(3)), Some(hours(5)), Some(own.id))
        .unwrap();
    assert_eq!(report.conflicts, vec![neighbour]);
    assert!(!service
        .has_conflict(hours(2), hours(4), Some(own.id))
        .unwrap());
}

#[test]
fn inverted_bounds_are_rejected() {
    let (mut conn, _) = conn_with_category();
    let service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());

    let err = service
        .check_conflicts(Some(hours(4)), Some(hours(2)), None)
        .unwrap_err();
    assert!(matches!(err, EventServiceError::InvalidDraft(_)));
    assert!(service.has_conflict(hours(2), hours(2), None).is_err());
}

#[test]
fn report_serializes_for_callers() {
    let (mut conn, category) = conn_with_category();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    service
        .create_event(EventDraft::new("slot", hours(2), hours(3), vec![category]))
        .unwrap();

    let report = service
        .check_conflicts(Some(hours(2)), Some(hours(3)), None)
        .unwrap();
    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["has_conflict"], true);
    assert_eq!(value["conflicts"][0]["name"], "slot");
    assert_eq!(value["conflicts"][0]["categories"][0]["name"], "Conference");
}
