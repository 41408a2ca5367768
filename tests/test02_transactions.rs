use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlite_sequencer::test_utils::MockEngine;
use sqlite_sequencer::{Database, SqlSequencerError, TransactionState};

fn open(engine: &Arc<MockEngine>) -> Database {
    Database::open("main", engine.clone()).expect("open database")
}

#[tokio::test]
async fn failed_statement_rolls_back_exactly_once() {
    let engine = MockEngine::new();
    engine.fail_when_sql_matches("^SELECT");
    let db = open(&engine);

    let err = db
        .transaction(|tx| async move {
            tx.execute_sql("SELECT * FROM users").await?;
            Ok::<(), SqlSequencerError>(())
        })
        .await
        .expect_err("transaction aborts");

    assert!(matches!(err, SqlSequencerError::TransactionAborted(_)));
    assert!(err.root_cause().is_statement_error());
    assert_eq!(engine.count_matching("^ROLLBACK"), 1);
    assert_eq!(engine.count_matching("^COMMIT"), 0);
}

#[tokio::test]
async fn successful_block_commits_once() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.transaction(|tx| async move {
        tx.insert("INSERT INTO users (name) VALUES (?)", vec!["ada".into()])
            .await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(
        engine.sql_history(),
        vec![
            "BEGIN EXCLUSIVE;",
            "INSERT INTO users (name) VALUES (?)",
            "COMMIT;"
        ]
    );
}

#[tokio::test]
async fn manual_commit_suppresses_the_automatic_one() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.transaction(|tx| async move {
        tx.execute_sql("UPDATE users SET name = 'x'").await?;
        tx.commit().await?;
        assert_eq!(tx.state(), TransactionState::Committed);
        tx.commit().await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(engine.count_matching("^COMMIT"), 1);
    assert_eq!(engine.count_matching("^ROLLBACK"), 0);
}

#[tokio::test]
async fn manual_rollback_finishes_without_commit() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.transaction(|tx| async move {
        tx.execute_sql("DELETE FROM users").await?;
        tx.rollback().await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(
        engine.sql_history(),
        vec!["BEGIN EXCLUSIVE;", "DELETE FROM users", "ROLLBACK;"]
    );
}

#[tokio::test]
async fn begin_failure_skips_the_block() {
    let engine = MockEngine::new();
    engine.fail_when_sql_matches("^BEGIN");
    let db = open(&engine);
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    let err = db
        .transaction(move |_tx| async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<(), SqlSequencerError>(())
        })
        .await
        .expect_err("begin fails");

    assert!(matches!(err, SqlSequencerError::TransactionBegin(_)));
    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(engine.sql_history(), vec!["BEGIN EXCLUSIVE;"]);
}

#[tokio::test]
async fn panicking_block_rolls_back() {
    let engine = MockEngine::new();
    let db = open(&engine);

    let err = db
        .transaction(|tx| async move {
            tx.execute_sql("SELECT 1").await?;
            let explode = true;
            if explode {
                panic!("boom");
            }
            Ok::<(), SqlSequencerError>(())
        })
        .await
        .expect_err("panic aborts");

    match err.root_cause() {
        SqlSequencerError::Other(message) => assert!(message.contains("boom")),
        other => panic!("unexpected root cause {other:?}"),
    }
    assert_eq!(
        engine.sql_history(),
        vec!["BEGIN EXCLUSIVE;", "SELECT 1", "ROLLBACK;"]
    );

    db.execute_sql("SELECT 2").await.expect("handle still usable");
}

#[tokio::test]
async fn handled_statement_error_still_commits() {
    let engine = MockEngine::new();
    engine.fail_when_sql_matches("missing_table");
    let db = open(&engine);

    db.transaction(|tx| async move {
        let probe = tx.execute_sql("SELECT * FROM missing_table").await;
        assert!(probe.is_err());
        tx.execute_sql("SELECT 1").await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(engine.count_matching("^COMMIT"), 1);
    assert_eq!(engine.count_matching("^ROLLBACK"), 0);
}

#[tokio::test]
async fn commit_failure_triggers_rollback() {
    let engine = MockEngine::new();
    engine.fail_when_sql_matches("^COMMIT");
    let db = open(&engine);

    let err = db
        .transaction(|tx| async move {
            tx.execute_sql("SELECT 1").await?;
            Ok::<(), SqlSequencerError>(())
        })
        .await
        .expect_err("commit fails");

    assert!(matches!(err, SqlSequencerError::TransactionAborted(_)));
    assert_eq!(
        engine.sql_history(),
        vec!["BEGIN EXCLUSIVE;", "SELECT 1", "COMMIT;", "ROLLBACK;"]
    );
}

#[tokio::test]
async fn finished_handle_rejects_statements() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.transaction(|tx| async move {
        tx.commit().await?;
        let err = tx.execute_sql("SELECT 1").await.expect_err("finished");
        assert!(matches!(err, SqlSequencerError::TransactionFinished));
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(engine.sql_history(), vec!["BEGIN EXCLUSIVE;", "COMMIT;"]);
}

#[tokio::test]
async fn block_statements_keep_submission_order() {
    let engine = MockEngine::new();
    let db = open(&engine);

    db.transaction(|tx| async move {
        let a = tx.execute_sql("SELECT 'a'");
        let b = tx.execute_sql("SELECT 'b'");
        let c = tx.execute_sql("SELECT 'c'");
        c.await?;
        a.await?;
        b.await?;
        Ok::<(), SqlSequencerError>(())
    })
    .await
    .expect("transaction");

    assert_eq!(
        engine.sql_history(),
        vec![
            "BEGIN EXCLUSIVE;",
            "SELECT 'a'",
            "SELECT 'b'",
            "SELECT 'c'",
            "COMMIT;"
        ]
    );
}
