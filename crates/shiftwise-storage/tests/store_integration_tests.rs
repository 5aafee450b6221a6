//! SQLite integration tests for the schedule store: session round trips,
//! decision upserts, and at-most-once apply commits.

use chrono::Utc;

use shiftwise_core::domain::{
    AssistantSession, Decision, DecisionRecord, DecisionSource, Shift, SuggestionVersion, User,
    SESSION_SCHEMA_VERSION,
};
use shiftwise_core::engine::apply::ShiftWrite;
use shiftwise_core::ports::{ApplyCommit, CommitOutcome, ScheduleStore};
use shiftwise_storage::{init_assistant_db, init_test_db, SqliteScheduleStore};

fn shift(id: &str, user: &str, date: &str, start: &str, end: &str) -> Shift {
    Shift {
        id: id.to_string(),
        user_id: user.to_string(),
        unit_id: "unit-1".to_string(),
        date_key: date.to_string(),
        start_time: start.to_string(),
        end_time: Some(end.to_string()),
        position_id: Some("p1".to_string()),
    }
}

fn decision(suggestion_id: &str, decision: Decision, timestamp: i64) -> DecisionRecord {
    DecisionRecord {
        suggestion_id: suggestion_id.to_string(),
        decision,
        timestamp: Some(timestamp),
        session_id: Some("sess-1".to_string()),
        suggestion_version: SuggestionVersion::V2,
        reason: None,
        source: Some(DecisionSource::User),
    }
}

fn session(session_id: &str) -> AssistantSession {
    let now = Utc::now().timestamp_millis();
    AssistantSession {
        session_id: session_id.to_string(),
        decisions: Vec::new(),
        schema_version: SESSION_SCHEMA_VERSION,
        context_key: "assistant-context:v1:test".to_string(),
        created_at: now,
        updated_at: now,
        expires_at: None,
    }
}

fn apply_commit(suggestion_id: &str, writes: Vec<ShiftWrite>) -> ApplyCommit {
    ApplyCommit {
        unit_id: "unit-1".to_string(),
        suggestion_id: suggestion_id.to_string(),
        session_id: "sess-1".to_string(),
        signature_hash: "deadbeef".to_string(),
        applied_at: 1_000,
        writes,
        decision: decision(suggestion_id, Decision::Accepted, 1_000),
    }
}

#[tokio::test]
async fn test_init_creates_schema_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assistant.db");
    let pool = init_assistant_db(path.to_str().unwrap()).await.unwrap();

    let store = SqliteScheduleStore::new(pool);
    assert!(store.list_shifts("unit-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_user_and_shift_round_trip() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());

    store
        .upsert_user(&User {
            id: "u1".to_string(),
            display_name: "Anna".to_string(),
            is_active: true,
        })
        .await
        .unwrap();
    store
        .upsert_shift(&shift("s1", "u1", "2025-01-06", "09:00", "12:00"))
        .await
        .unwrap();

    let user = store.get_user("u1").await.unwrap().unwrap();
    assert!(user.is_active);

    let shifts = store.list_shifts("unit-1").await.unwrap();
    assert_eq!(shifts.len(), 1);
    assert_eq!(shifts[0].id, "s1");
    assert_eq!(shifts[0].end_time.as_deref(), Some("12:00"));
}

#[tokio::test]
async fn test_session_round_trip_with_decisions() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());

    store.save_session(&session("sess-1")).await.unwrap();
    store
        .save_decision("sess-1", &decision("sug-b", Decision::Rejected, 10))
        .await
        .unwrap();
    store
        .save_decision("sess-1", &decision("sug-a", Decision::Accepted, 20))
        .await
        .unwrap();

    let loaded = store.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(loaded.schema_version, SESSION_SCHEMA_VERSION);
    assert_eq!(loaded.decisions.len(), 2);
    // decisions come back ordered by suggestion id
    assert_eq!(loaded.decisions[0].suggestion_id, "sug-a");
    assert_eq!(loaded.decisions[1].suggestion_id, "sug-b");
    // the decision write touches updated_at
    assert_eq!(loaded.updated_at, 20);
}

#[tokio::test]
async fn test_decision_upsert_keeps_one_row_per_suggestion() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());
    store.save_session(&session("sess-1")).await.unwrap();

    store
        .save_decision("sess-1", &decision("sug-a", Decision::Rejected, 10))
        .await
        .unwrap();
    store
        .save_decision("sess-1", &decision("sug-a", Decision::Accepted, 20))
        .await
        .unwrap();

    let loaded = store.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(loaded.decisions.len(), 1);
    assert_eq!(loaded.decisions[0].decision, Decision::Accepted);
    assert_eq!(loaded.decisions[0].timestamp, Some(20));
}

#[tokio::test]
async fn test_commit_apply_writes_shift_ledger_and_decision() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());
    store.save_session(&session("sess-1")).await.unwrap();

    let commit = apply_commit(
        "assistant-suggestion:v2:abc",
        vec![ShiftWrite::Create(shift(
            "gen:u1:2025-01-06:08:00:09:00:p1",
            "u1",
            "2025-01-06",
            "08:00",
            "09:00",
        ))],
    );

    let outcome = store.commit_apply(&commit).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);

    let shifts = store.list_shifts("unit-1").await.unwrap();
    assert_eq!(shifts.len(), 1);

    let ledger = store
        .get_applied_ledger("unit-1", "assistant-suggestion:v2:abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ledger.applied_shift_ids, vec![shifts[0].id.clone()]);

    let loaded = store.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(loaded.decisions.len(), 1);
    assert_eq!(loaded.decisions[0].decision, Decision::Accepted);
}

#[tokio::test]
async fn test_commit_apply_is_at_most_once() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());
    store.save_session(&session("sess-1")).await.unwrap();

    let commit = apply_commit(
        "assistant-suggestion:v2:abc",
        vec![ShiftWrite::Create(shift(
            "gen:u1:2025-01-06:08:00:09:00:p1",
            "u1",
            "2025-01-06",
            "08:00",
            "09:00",
        ))],
    );

    assert_eq!(store.commit_apply(&commit).await.unwrap(), CommitOutcome::Applied);
    assert_eq!(
        store.commit_apply(&commit).await.unwrap(),
        CommitOutcome::AlreadyApplied
    );
    assert_eq!(store.list_shifts("unit-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_commit_apply_detects_noop_by_fingerprint() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());
    store.save_session(&session("sess-1")).await.unwrap();

    // A shift with the same placement already exists under another id.
    store
        .upsert_shift(&shift("existing", "u1", "2025-01-06", "08:00", "09:00"))
        .await
        .unwrap();

    let commit = apply_commit(
        "assistant-suggestion:v2:abc",
        vec![ShiftWrite::Create(shift(
            "gen:u1:2025-01-06:08:00:09:00:p1",
            "u1",
            "2025-01-06",
            "08:00",
            "09:00",
        ))],
    );

    let outcome = store.commit_apply(&commit).await.unwrap();
    assert_eq!(outcome, CommitOutcome::Unchanged);
    // no second shift, no ledger entry, but a decision record
    assert_eq!(store.list_shifts("unit-1").await.unwrap().len(), 1);
    assert!(store
        .get_applied_ledger("unit-1", "assistant-suggestion:v2:abc")
        .await
        .unwrap()
        .is_none());
    let loaded = store.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(loaded.decisions.len(), 1);
}

#[tokio::test]
async fn test_commit_apply_updates_existing_shift() {
    let store = SqliteScheduleStore::new(init_test_db().await.unwrap());
    store.save_session(&session("sess-1")).await.unwrap();
    store
        .upsert_shift(&shift("s1", "u1", "2025-01-06", "09:00", "12:00"))
        .await
        .unwrap();

    let mut moved = shift("s1", "u1", "2025-01-07", "22:00", "02:00");
    moved.position_id = Some("p2".to_string());
    let commit = apply_commit(
        "assistant-suggestion:v2:move",
        vec![ShiftWrite::Update {
            shift_id: "s1".to_string(),
            next: moved,
        }],
    );

    assert_eq!(store.commit_apply(&commit).await.unwrap(), CommitOutcome::Applied);

    let shifts = store.list_shifts("unit-1").await.unwrap();
    assert_eq!(shifts.len(), 1);
    assert_eq!(shifts[0].date_key, "2025-01-07");
    assert_eq!(shifts[0].start_time, "22:00");
    assert_eq!(shifts[0].position_id.as_deref(), Some("p2"));
}
