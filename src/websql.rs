//! WebSQL-shaped adapter over [`Database`].
//!
//! Results are reshaped to mimic browser WebSQL: `insert_id` and `rows_affected` are
//! adjusted per statement kind. Ordering and atomicity come from the wrapped handle.

use std::future::Future;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::database::Database;
use crate::engine::Engine;
use crate::error::SqlSequencerError;
use crate::pending::{PendingBatch, PendingTransaction};
use crate::query::Query;
use crate::results::{ResultSet, Row};
use crate::transaction::TransactionHandle;
use crate::types::SqlValue;

static UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^\s*UPDATE\b"));
static INSERT_RE: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^\s*INSERT\b"));
static CREATE_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| build_regex(r"(?i)^\s*CREATE\s+TABLE\b"));
static DROP_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| build_regex(r"(?i)^\s*DROP\s+TABLE\b"));

fn build_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("WebSQL statement pattern")
}

/// WebSQL-style database: a [`Database`] plus a version string.
#[derive(Debug, Clone)]
pub struct WebSqlDatabase {
    db: Database,
    version: String,
}

impl WebSqlDatabase {
    /// Open `name` on `engine`.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::ConfigError`] for an empty name or when called
    /// outside a tokio runtime.
    pub fn open(
        name: impl Into<String>,
        version: impl Into<String>,
        engine: Arc<dyn Engine>,
    ) -> Result<Self, SqlSequencerError> {
        Ok(Self {
            db: Database::open(name, engine)?,
            version: version.into(),
        })
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Queue a transaction whose block receives a [`WebSqlTransaction`].
    pub fn transaction<F, Fut>(&self, block: F) -> PendingTransaction
    where
        F: FnOnce(WebSqlTransaction) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SqlSequencerError>> + Send + 'static,
    {
        self.db.transaction(move |handle| {
            block(WebSqlTransaction {
                target: Target::Transaction(handle),
            })
        })
    }

    /// Run `block` with statements going through the top-level queue, without
    /// BEGIN or COMMIT.
    ///
    /// # Errors
    /// Returns whatever error the block returns.
    pub async fn read_transaction<F, Fut>(&self, block: F) -> Result<(), SqlSequencerError>
    where
        F: FnOnce(WebSqlTransaction) -> Fut,
        Fut: Future<Output = Result<(), SqlSequencerError>>,
    {
        block(WebSqlTransaction {
            target: Target::Database(self.db.clone()),
        })
        .await
    }

    /// Run `queries` as one engine call; see [`Database::exec_batch`].
    pub fn exec(&self, queries: Vec<Query>, read_only: bool) -> PendingBatch {
        self.db.exec_batch(queries, read_only)
    }

    /// Close the underlying handle.
    pub fn close(&self) -> impl Future<Output = Result<(), SqlSequencerError>> + Send + 'static {
        self.db.close()
    }
}

#[derive(Debug, Clone)]
enum Target {
    Transaction(TransactionHandle),
    Database(Database),
}

/// Statement surface handed to WebSQL transaction blocks.
#[derive(Debug, Clone)]
pub struct WebSqlTransaction {
    target: Target,
}

impl WebSqlTransaction {
    /// Queue a statement. It is submitted immediately; the returned future only waits
    /// for the massaged result.
    pub fn execute_sql(
        &self,
        sql: impl Into<String>,
        args: Vec<SqlValue>,
    ) -> impl Future<Output = Result<WebSqlResultSet, SqlSequencerError>> + Send + 'static {
        let query = Query::new(sql, args);
        let sql = query.sql().to_owned();
        let pending = match &self.target {
            Target::Transaction(handle) => handle.execute_sql(query),
            Target::Database(db) => db.execute_sql(query),
        };
        async move { pending.await.map(|result| massage_result(&sql, result)) }
    }
}

/// Rows of a [`WebSqlResultSet`], addressable by position.
#[derive(Debug, Clone, Default)]
pub struct WebSqlRows {
    rows: Vec<Row>,
}

impl WebSqlRows {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn item(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebSqlResultSet {
    pub insert_id: Option<i64>,
    pub rows_affected: usize,
    pub rows: WebSqlRows,
}

/// Reshape an engine result the way browser WebSQL reports it for `sql`.
#[must_use]
pub fn massage_result(sql: &str, result: ResultSet) -> WebSqlResultSet {
    let mut insert_id = result.insert_id;
    let mut rows_affected = result.rows_affected;

    if UPDATE_RE.is_match(sql) {
        insert_id = None;
    } else if CREATE_TABLE_RE.is_match(sql) {
        insert_id = Some(0);
        rows_affected = 0;
    } else if DROP_TABLE_RE.is_match(sql) {
        insert_id = None;
        rows_affected = 0;
    } else if !INSERT_RE.is_match(sql) {
        insert_id = None;
    }

    WebSqlResultSet {
        insert_id,
        rows_affected,
        rows: WebSqlRows { rows: result.rows },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(insert_id: Option<i64>, rows_affected: usize) -> ResultSet {
        ResultSet::from_columns(insert_id, rows_affected, Vec::new(), Vec::new())
    }

    #[test]
    fn create_table_reports_zero_insert_id() {
        let massaged = massage_result("create table t (id integer)", raw(Some(7), 3));
        assert_eq!(massaged.insert_id, Some(0));
        assert_eq!(massaged.rows_affected, 0);
    }

    #[test]
    fn drop_table_reports_nothing() {
        let massaged = massage_result("DROP TABLE t", raw(Some(7), 3));
        assert_eq!(massaged.insert_id, None);
        assert_eq!(massaged.rows_affected, 0);
    }

    #[test]
    fn update_keeps_rows_affected_but_drops_insert_id() {
        let massaged = massage_result("  UPDATE t SET a = 1", raw(Some(7), 2));
        assert_eq!(massaged.insert_id, None);
        assert_eq!(massaged.rows_affected, 2);
    }

    #[test]
    fn insert_keeps_insert_id() {
        let massaged = massage_result("INSERT INTO t VALUES (1)", raw(Some(7), 1));
        assert_eq!(massaged.insert_id, Some(7));
        assert_eq!(massaged.rows_affected, 1);
    }

    #[test]
    fn select_rows_are_indexable() {
        let result = ResultSet::from_columns(
            None,
            0,
            vec!["id".into()],
            vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
        );
        let massaged = massage_result("SELECT id FROM t", result);
        assert_eq!(massaged.rows.len(), 2);
        assert_eq!(
            massaged.rows.item(1).and_then(|row| row.get("id")),
            Some(&SqlValue::Int(2))
        );
        assert!(massaged.rows.item(2).is_none());
    }
}
