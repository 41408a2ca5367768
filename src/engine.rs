//! The engine capability: the SQL backend the queues submit batches to.
//!
//! Implementations receive one ordered batch per call and must answer with exactly
//! one outcome per statement, in the same order. A statement failure belongs in its
//! outcome; an `Err` from [`Engine::submit_batch`] means the whole call failed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SqlSequencerError;
use crate::query::Query;
use crate::results::ResultSet;
use crate::statement::{StatementType, escape_blob};
use crate::types::SqlValue;

/// Statement as handed to the engine, with its type hint.
///
/// Serializes as the bridge tuple `[sql, args, type]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "(String, Vec<SqlValue>, StatementType)",
    into = "(String, Vec<SqlValue>, StatementType)"
)]
pub struct NativeStatement {
    pub sql: String,
    pub args: Vec<SqlValue>,
    pub statement_type: StatementType,
}

impl NativeStatement {
    /// Prepare a query for submission, escaping text arguments when asked to.
    #[must_use]
    pub fn from_query(query: Query, escape_text_args: bool) -> Self {
        let statement_type = query.statement_type();
        let (sql, args) = query.into_parts();
        let args = if escape_text_args {
            args.into_iter().map(escape_blob).collect()
        } else {
            args
        };
        Self {
            sql,
            args,
            statement_type,
        }
    }
}

impl From<(String, Vec<SqlValue>, StatementType)> for NativeStatement {
    fn from((sql, args, statement_type): (String, Vec<SqlValue>, StatementType)) -> Self {
        Self {
            sql,
            args,
            statement_type,
        }
    }
}

impl From<NativeStatement> for (String, Vec<SqlValue>, StatementType) {
    fn from(statement: NativeStatement) -> Self {
        (statement.sql, statement.args, statement.statement_type)
    }
}

type OutcomeTuple = (
    Option<String>,
    Option<i64>,
    usize,
    Vec<String>,
    Vec<Vec<SqlValue>>,
);

/// Per-statement outcome reported by the engine.
///
/// Serializes as the bridge tuple `[errorMessage, insertId, rowsAffected, columns, rows]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "OutcomeTuple", into = "OutcomeTuple")]
pub struct NativeOutcome {
    pub error_message: Option<String>,
    pub insert_id: Option<i64>,
    pub rows_affected: usize,
    pub column_names: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl NativeOutcome {
    #[must_use]
    pub fn success(
        insert_id: Option<i64>,
        rows_affected: usize,
        column_names: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        Self {
            error_message: None,
            insert_id,
            rows_affected,
            column_names,
            rows,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Convert into the caller-facing result.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::Statement`] when the engine reported an error message.
    pub fn into_result(self) -> Result<ResultSet, SqlSequencerError> {
        match self.error_message {
            Some(message) => Err(SqlSequencerError::Statement(message)),
            None => Ok(ResultSet::from_columns(
                self.insert_id,
                self.rows_affected,
                self.column_names,
                self.rows,
            )),
        }
    }
}

impl From<OutcomeTuple> for NativeOutcome {
    fn from(
        (error_message, insert_id, rows_affected, column_names, rows): OutcomeTuple,
    ) -> Self {
        Self {
            error_message,
            insert_id,
            rows_affected,
            column_names,
            rows,
        }
    }
}

impl From<NativeOutcome> for OutcomeTuple {
    fn from(outcome: NativeOutcome) -> Self {
        (
            outcome.error_message,
            outcome.insert_id,
            outcome.rows_affected,
            outcome.column_names,
            outcome.rows,
        )
    }
}

/// Backend that executes statement batches against named persistent stores.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Execute `statements` as one call against `database`.
    ///
    /// # Errors
    /// Returns an error only when the call as a whole failed; per-statement failures
    /// are reported through [`NativeOutcome::error_message`].
    async fn submit_batch(
        &self,
        database: &str,
        statements: Vec<NativeStatement>,
        read_only: bool,
    ) -> Result<Vec<NativeOutcome>, SqlSequencerError>;

    /// Release the store named `database`. Closing twice is not an error.
    ///
    /// # Errors
    /// Returns an error if the backend could not release the store.
    async fn close_database(&self, database: &str) -> Result<(), SqlSequencerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepares_query_with_type_hint() {
        let query = Query::new("SELECT * FROM users WHERE id=?", vec![SqlValue::Int(42)]);
        let statement = NativeStatement::from_query(query, false);
        assert_eq!(statement.statement_type, StatementType::Select);
        assert_eq!(statement.args, vec![SqlValue::Int(42)]);
    }

    #[test]
    fn escapes_only_when_enabled() {
        let query = Query::new("INSERT INTO t VALUES (?)", vec!["a\u{0}".into()]);
        let raw = NativeStatement::from_query(query.clone(), false);
        let escaped = NativeStatement::from_query(query, true);
        assert_eq!(raw.args, vec![SqlValue::Text("a\u{0}".into())]);
        assert_eq!(escaped.args, vec![SqlValue::Text("a\u{1}\u{1}".into())]);
    }

    #[test]
    fn failure_outcome_becomes_statement_error() {
        let err = NativeOutcome::failure("no such table: users")
            .into_result()
            .expect_err("failure outcome");
        assert!(matches!(err, SqlSequencerError::Statement(msg) if msg == "no such table: users"));
    }

    #[test]
    fn serializes_as_bridge_tuples() {
        let statement = NativeStatement::from_query(
            Query::new("SELECT * FROM users WHERE id=?", vec![SqlValue::Int(42)]),
            false,
        );
        let json = serde_json::to_string(&statement).expect("serialize statement");
        assert_eq!(json, r#"["SELECT * FROM users WHERE id=?",[42],1]"#);

        let outcome: NativeOutcome =
            serde_json::from_str(r#"[null,7,1,["id","name"],[[7,"bob"]]]"#).expect("outcome");
        let set = outcome.into_result().expect("success");
        assert_eq!(set.insert_id, Some(7));
        assert_eq!(set.rows_affected, 1);
        assert_eq!(set.rows[0].get("name"), Some(&SqlValue::Text("bob".into())));
    }
}
