use rusqlite::TransactionBehavior;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use timeline_core::db::{open_db, open_db_with_busy_timeout};
use timeline_core::{
    CategoryId, CategoryRepository, EventDraft, EventService, EventServiceError,
    SqliteCategoryRepository, SqliteEventRepository,
};

fn seed_category(path: &Path) -> CategoryId {
    let mut conn = open_db(path).unwrap();
    let mut repo = SqliteCategoryRepository::try_new(&mut conn).unwrap();
    repo.seed_default_categories().unwrap()[0].id
}

fn race_creates(path: &Path, drafts: Vec<EventDraft>) -> Vec<Result<(), EventServiceError>> {
    let barrier = Arc::new(Barrier::new(drafts.len()));
    let handles = drafts
        .into_iter()
        .map(|draft| {
            let mut conn = open_db(path).unwrap();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut service =
                    EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
                barrier.wait();
                service.create_event(draft).map(|_| ())
            })
        })
        .collect::<Vec<_>>();

    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect()
}

fn event_count(path: &Path) -> i64 {
    open_db(path)
        .unwrap()
        .query_row("SELECT COUNT(*) FROM events;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn two_writers_with_intersecting_intervals_never_both_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    let category = seed_category(&path);

    let results = race_creates(
        &path,
        vec![
            EventDraft::new("left", 1_000, 3_000, vec![category]),
            EventDraft::new("right", 2_000, 4_000, vec![category]),
        ],
    );

    let committed = results.iter().filter(|result| result.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|result| {
            matches!(result, Err(EventServiceError::OverlapConflict(events)) if events.len() == 1)
        })
        .count();
    assert_eq!(committed, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(event_count(&path), 1);
}

#[test]
fn many_writers_for_one_slot_produce_exactly_one_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stampede.db");
    let category = seed_category(&path);

    let drafts = (0..8)
        .map(|index| {
            EventDraft::new(
                format!("writer-{index}"),
                10_000,
                20_000,
                vec![category],
            )
        })
        .collect::<Vec<_>>();
    let results = race_creates(&path, drafts);

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|result| result.is_err())
        .all(|result| matches!(result, Err(EventServiceError::OverlapConflict(_)))));
    assert_eq!(event_count(&path), 1);
}

#[test]
fn disjoint_writers_all_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disjoint.db");
    let category = seed_category(&path);

    let drafts = (0..4_i64)
        .map(|index| {
            EventDraft::new(
                format!("slot-{index}"),
                index * 1_000,
                (index + 1) * 1_000,
                vec![category],
            )
        })
        .collect::<Vec<_>>();
    let results = race_creates(&path, drafts);

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(event_count(&path), 4);
}

#[test]
fn blocked_writer_fails_after_busy_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("locked.db");
    let category = seed_category(&path);

    let mut holder = open_db(&path).unwrap();
    let lock = holder
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .unwrap();

    let mut conn = open_db_with_busy_timeout(&path, Duration::from_millis(50)).unwrap();
    let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
    let err = service
        .create_event(EventDraft::new("late", 0, 1_000, vec![category]))
        .unwrap_err();
    assert!(matches!(err, EventServiceError::Storage(_)));
    assert!(!err.is_domain_outcome());

    lock.rollback().unwrap();
    service
        .create_event(EventDraft::new("late", 0, 1_000, vec![category]))
        .unwrap();
}

#[test]
fn update_racing_create_for_the_same_slot_never_both_commit() {
    for round in 0..20 {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("update_race_{round}.db"));
        let category = seed_category(&path);

        let moving = {
            let mut conn = open_db(&path).unwrap();
            let mut service = EventService::new(SqliteEventRepository::try_new(&mut conn).unwrap());
            service
                .create_event(EventDraft::new("moving", 0, 100, vec![category]))
                .unwrap()
        };

        let barrier = Arc::new(Barrier::new(2));
        let mut update_conn = open_db(&path).unwrap();
        let update_barrier = Arc::clone(&barrier);
        let updater = thread::spawn(move || {
            let mut service =
                EventService::new(SqliteEventRepository::try_new(&mut update_conn).unwrap());
            update_barrier.wait();
            service
                .update_event(
                    moving.id,
                    EventDraft::new("moving", 1_000, 2_000, vec![category]),
                )
                .map(|_| ())
        });

        let mut create_conn = open_db(&path).unwrap();
        let create_barrier = Arc::clone(&barrier);
        let creator = thread::spawn(move || {
            let mut service =
                EventService::new(SqliteEventRepository::try_new(&mut create_conn).unwrap());
            create_barrier.wait();
            service
                .create_event(EventDraft::new("new", 1_500, 2_500, vec![category]))
                .map(|_| ())
        });

        let results = [updater.join().unwrap(), creator.join().unwrap()];
        let committed = results.iter().filter(|result| result.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|result| matches!(result, Err(EventServiceError::OverlapConflict(_))))
            .count();
        assert_eq!(committed, 1, "round {round}: {results:?}");
        assert_eq!(conflicts, 1, "round {round}: {results:?}");

        let conn = open_db(&path).unwrap();
        let overlapping: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events a JOIN events b
                   ON a.uuid < b.uuid AND a.start_ms < b.end_ms AND b.start_ms < a.end_ms;",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(overlapping, 0, "round {round}");
    }
}
