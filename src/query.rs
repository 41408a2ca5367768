use crate::statement::{StatementType, classify};
use crate::types::SqlValue;

/// A SQL string and its bound arguments.
///
/// Immutable once built; ownership moves into the statement queue on submission.
/// ```rust
/// use sqlite_sequencer::prelude::*;
///
/// let query = Query::new("SELECT * FROM users WHERE id = ?", vec![42_i64.into()]);
/// assert_eq!(query.statement_type(), StatementType::Select);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    sql: String,
    args: Vec<SqlValue>,
}

impl Query {
    #[must_use]
    pub fn new(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    #[must_use]
    pub fn without_args(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    #[must_use]
    pub fn statement_type(&self) -> StatementType {
        classify(&self.sql)
    }

    pub(crate) fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.args)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Query::without_args(sql)
    }
}

impl From<String> for Query {
    fn from(sql: String) -> Self {
        Query::without_args(sql)
    }
}
