use std::sync::{Arc, Mutex};

use sqlite_sequencer::test_utils::MockEngine;
use sqlite_sequencer::{
    NativeOutcome, Query, SqlSequencerError, SqlValue, WebSqlDatabase, WebSqlResultSet,
};

fn open(engine: &Arc<MockEngine>) -> WebSqlDatabase {
    WebSqlDatabase::open("legacy.db", "1.0", engine.clone()).expect("open websql")
}

#[tokio::test]
async fn transaction_results_are_massaged_per_statement_kind() {
    let engine = MockEngine::new();
    engine.respond_when_sql_matches("^CREATE", NativeOutcome::success(Some(3), 4, vec![], vec![]));
    engine.respond_when_sql_matches("^INSERT", NativeOutcome::success(Some(5), 1, vec![], vec![]));
    engine.respond_when_sql_matches("^UPDATE", NativeOutcome::success(Some(5), 2, vec![], vec![]));
    engine.respond_when_sql_matches(
        "^SELECT",
        NativeOutcome::success(
            Some(5),
            0,
            vec!["id".into()],
            vec![vec![SqlValue::Int(5)]],
        ),
    );
    let db = open(&engine);
    let seen: Arc<Mutex<Vec<WebSqlResultSet>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    db.transaction(move |tx| async move {
        let create = tx.execute_sql("CREATE TABLE items (id INTEGER)", vec![]);
        let insert = tx.execute_sql("INSERT INTO items VALUES (?)", vec![SqlValue::Int(5)]);
        let update = tx.execute_sql("UPDATE items SET id = 6", vec![]);
        let select = tx.execute_sql("SELECT id FROM items", vec![]);
        let results = vec![create.await?, insert.await?, update.await?, select.await?];
        sink.lock().expect("sink lock").extend(results);
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    let seen = seen.lock().expect("sink lock");
    assert_eq!((seen[0].insert_id, seen[0].rows_affected), (Some(0), 0));
    assert_eq!((seen[1].insert_id, seen[1].rows_affected), (Some(5), 1));
    assert_eq!((seen[2].insert_id, seen[2].rows_affected), (None, 2));
    assert_eq!(seen[3].insert_id, None);
    assert_eq!(seen[3].rows.len(), 1);
    assert_eq!(
        seen[3].rows.item(0).and_then(|row| row.get("id")),
        Some(&SqlValue::Int(5))
    );
    assert_eq!(engine.count_matching("^BEGIN"), 1);
    assert_eq!(engine.count_matching("^COMMIT"), 1);
}

#[tokio::test]
async fn read_transaction_skips_begin_and_commit() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.read_transaction(|tx| async move {
        tx.execute_sql("SELECT 1", vec![]).await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("read transaction");

    assert_eq!(engine.sql_history(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn exec_passes_the_read_only_flag() {
    let engine = MockEngine::new();
    let db = open(&engine);

    let outcomes = db
        .exec(vec![Query::without_args("SELECT 1")], true)
        .await
        .expect("exec");
    assert_eq!(outcomes.len(), 1);
    assert_eq!(engine.read_only_flags(), vec![true]);
    assert_eq!(db.version(), "1.0");
    assert_eq!(db.database().name(), "legacy.db");
}

#[tokio::test]
async fn empty_name_is_rejected() {
    let result = WebSqlDatabase::open("", "1.0", MockEngine::new());
    assert!(matches!(result, Err(SqlSequencerError::ConfigError(_))));
}
