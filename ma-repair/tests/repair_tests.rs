//! Repair job against a fixture SQLite database

use ma_repair::job::{repair_record, select_candidates, RecordOutcome};
use ma_repair::{db, run_repair, RepairError, RepairOptions, RepairReport};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

const SCHEMA: &str = r#"
    CREATE TABLE sessions (
        session_id TEXT PRIMARY KEY,
        entry_url TEXT
    );
    CREATE TABLE utm_sessions (
        id INTEGER PRIMARY KEY,
        session_id TEXT NOT NULL,
        utm_params TEXT,
        entry_timestamp TEXT
    );
"#;

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analytics.db");
    let setup = SqlitePool::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();
    sqlx::raw_sql(SCHEMA).execute(&setup).await.unwrap();
    setup.close().await;

    let pool = db::connect(&path).await.unwrap();
    Fixture { _dir: dir, pool }
}

async fn insert(pool: &SqlitePool, id: i64, entry_url: &str, utm_params: Option<&str>, ts: &str) {
    let session_id = format!("s-{id}");
    sqlx::query("INSERT INTO sessions (session_id, entry_url) VALUES (?, ?)")
        .bind(&session_id)
        .bind(entry_url)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO utm_sessions (id, session_id, utm_params, entry_timestamp) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&session_id)
    .bind(utm_params)
    .bind(ts)
    .execute(pool)
    .await
    .unwrap();
}

async fn params(pool: &SqlitePool, id: i64) -> Option<Value> {
    let raw: Option<String> = sqlx::query_scalar("SELECT utm_params FROM utm_sessions WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap();
    raw.map(|raw| serde_json::from_str(&raw).unwrap())
}

/// Two recoverable rows and rows the predicate must leave alone
async fn seed(pool: &SqlitePool) {
    insert(
        pool,
        1,
        "https://shop.test/?utm_source=meta&utm_content=77%%20grip&utm_id=120",
        Some(r#"{"utm_source":"meta","utm_content":"","utm_id":"120"}"#),
        "2025-10-01T10:00:00Z",
    )
    .await;
    insert(
        pool,
        2,
        "https://shop.test/p?utm_content=%25EB%25B4%2584+%25ED%2595%25A0%25EC%259D%25B8",
        Some(r#"{"utm_source":"naver"}"#),
        "2025-10-02T10:00:00Z",
    )
    .await;
    // Empty value at the end of the URL: excluded by the predicate
    insert(
        pool,
        3,
        "https://shop.test/?utm_source=fb&utm_content=",
        Some(r#"{"utm_source":"fb","utm_content":""}"#),
        "2025-10-03T10:00:00Z",
    )
    .await;
    // Empty value followed by another parameter: excluded
    insert(
        pool,
        4,
        "https://shop.test/?utm_content=&utm_source=fb",
        Some(r#"{"utm_source":"fb","utm_content":""}"#),
        "2025-10-04T10:00:00Z",
    )
    .await;
    // Already has content
    insert(
        pool,
        5,
        "https://shop.test/?utm_content=banner",
        Some(r#"{"utm_content":"banner"}"#),
        "2025-10-05T10:00:00Z",
    )
    .await;
    // No utm_content in the URL
    insert(
        pool,
        6,
        "https://shop.test/?utm_source=google",
        None,
        "2025-10-06T10:00:00Z",
    )
    .await;
    // Empty value followed by a fragment: excluded
    insert(
        pool,
        7,
        "https://shop.test/?utm_source=fb&utm_content=#reviews",
        Some(r#"{"utm_source":"fb"}"#),
        "2025-10-07T10:00:00Z",
    )
    .await;
}

#[tokio::test]
async fn test_selection_predicate() {
    let fx = fixture().await;
    seed(&fx.pool).await;

    let ids: Vec<i64> = select_candidates(&fx.pool).await.unwrap().iter().map(|r| r.id).collect();
    // Newest entry first
    assert_eq!(ids, vec![2, 1]);
}

#[tokio::test]
async fn test_repair_then_rerun_is_idempotent() {
    let fx = fixture().await;
    seed(&fx.pool).await;

    let first = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(
        first,
        RepairReport { selected: 2, succeeded: 2, skipped: 0, failed: 0 }
    );

    let second = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(second, RepairReport::default());
}

#[tokio::test]
async fn test_repair_merges_and_preserves_keys() {
    let fx = fixture().await;
    seed(&fx.pool).await;

    run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();

    assert_eq!(
        params(&fx.pool, 1).await,
        Some(json!({"utm_source": "meta", "utm_content": "77% grip", "utm_id": "120"}))
    );
    assert_eq!(
        params(&fx.pool, 2).await,
        Some(json!({"utm_source": "naver", "utm_content": "봄 할인"}))
    );
    // Skipped and unselected rows untouched
    assert_eq!(params(&fx.pool, 3).await, Some(json!({"utm_source": "fb", "utm_content": ""})));
    assert_eq!(params(&fx.pool, 4).await, Some(json!({"utm_source": "fb", "utm_content": ""})));
    assert_eq!(params(&fx.pool, 6).await, None);
}

#[tokio::test]
async fn test_null_params_get_new_mapping() {
    let fx = fixture().await;
    insert(&fx.pool, 1, "/?utm_content=video_a", None, "2025-10-01T10:00:00Z").await;

    let report = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(params(&fx.pool, 1).await, Some(json!({"utm_content": "video_a"})));
}

#[tokio::test]
async fn test_malformed_record_counted_and_batch_continues() {
    let fx = fixture().await;
    insert(&fx.pool, 1, "/?utm_content=a", Some("{not json"), "2025-10-01T10:00:00Z").await;
    insert(&fx.pool, 2, "/?utm_content=b", Some("[1,2]"), "2025-10-02T10:00:00Z").await;
    insert(&fx.pool, 3, "/?utm_content=c", Some("{}"), "2025-10-03T10:00:00Z").await;

    let report = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(
        report,
        RepairReport { selected: 3, succeeded: 1, skipped: 0, failed: 2 }
    );
    assert_eq!(params(&fx.pool, 3).await, Some(json!({"utm_content": "c"})));

    let raw: Option<String> = sqlx::query_scalar("SELECT utm_params FROM utm_sessions WHERE id = 1")
        .fetch_one(&fx.pool)
        .await
        .unwrap();
    assert_eq!(raw.as_deref(), Some("{not json"));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let fx = fixture().await;
    seed(&fx.pool).await;

    let options = RepairOptions { dry_run: true, ..RepairOptions::default() };
    let report = run_repair(&fx.pool, &options).await.unwrap();
    assert_eq!(report.succeeded, 2);

    assert_eq!(
        params(&fx.pool, 1).await,
        Some(json!({"utm_source": "meta", "utm_content": "", "utm_id": "120"}))
    );
    assert_eq!(select_candidates(&fx.pool).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_change_is_conflict() {
    let fx = fixture().await;
    seed(&fx.pool).await;

    let records = select_candidates(&fx.pool).await.unwrap();
    let record = records.iter().find(|r| r.id == 1).unwrap();

    // Another writer updates the row after selection
    sqlx::query("UPDATE utm_sessions SET utm_params = ? WHERE id = 1")
        .bind(r#"{"utm_source":"meta","utm_content":"set elsewhere"}"#)
        .execute(&fx.pool)
        .await
        .unwrap();

    let result = repair_record(&fx.pool, record, false).await;
    assert!(matches!(result, Err(RepairError::Conflict { id: 1 })));
    assert_eq!(
        params(&fx.pool, 1).await,
        Some(json!({"utm_source": "meta", "utm_content": "set elsewhere"}))
    );
}

#[tokio::test]
async fn test_empty_url_values_never_selected() {
    let fx = fixture().await;
    insert(
        &fx.pool,
        1,
        "https://shop.test/?utm_source=fb&utm_content=",
        None,
        "2025-10-01T10:00:00Z",
    )
    .await;
    insert(&fx.pool, 2, "https://shop.test/?utm_content=#top", None, "2025-10-02T10:00:00Z").await;
    insert(
        &fx.pool,
        3,
        "https://shop.test/?utm_content=&utm_source=fb",
        None,
        "2025-10-03T10:00:00Z",
    )
    .await;

    assert!(select_candidates(&fx.pool).await.unwrap().is_empty());
    for _ in 0..2 {
        let report = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
        assert_eq!(report, RepairReport::default());
    }
}

#[tokio::test]
async fn test_skip_when_parameter_only_embedded() {
    let fx = fixture().await;
    // Matches the LIKE filter but is not a utm_content parameter
    insert(
        &fx.pool,
        1,
        "https://shop.test/?ref_utm_content=abc",
        None,
        "2025-10-01T10:00:00Z",
    )
    .await;

    let records = select_candidates(&fx.pool).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(repair_record(&fx.pool, &records[0], false).await.unwrap(), RecordOutcome::Skipped);

    let report = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(report, RepairReport { selected: 1, succeeded: 0, skipped: 1, failed: 0 });
    assert_eq!(params(&fx.pool, 1).await, None);
}

#[tokio::test]
async fn test_empty_database_reports_zero() {
    let fx = fixture().await;
    let report = run_repair(&fx.pool, &RepairOptions::default()).await.unwrap();
    assert_eq!(report, RepairReport::default());
}
