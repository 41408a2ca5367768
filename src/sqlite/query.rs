use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::engine::{NativeOutcome, NativeStatement};
use crate::statement::{StatementType, unescape_text};
use crate::types::SqlValue;

const READ_ONLY_VIOLATION: &str = "could not prepare statement (23 not authorized)";

/// Run one statement; any `SQLite` error becomes the statement's failure outcome.
pub(super) fn execute_statement(
    conn: &Connection,
    statement: &NativeStatement,
    read_only: bool,
    unescape_text_args: bool,
) -> NativeOutcome {
    if read_only && statement.statement_type != StatementType::Select {
        return NativeOutcome::failure(READ_ONLY_VIOLATION);
    }
    let params: Vec<Value> = statement
        .args
        .iter()
        .map(|arg| to_sqlite_value(arg, unescape_text_args))
        .collect();
    match run_statement(conn, statement, &params) {
        Ok(outcome) => outcome,
        Err(err) => NativeOutcome::failure(err.to_string()),
    }
}

fn run_statement(
    conn: &Connection,
    statement: &NativeStatement,
    params: &[Value],
) -> Result<NativeOutcome, rusqlite::Error> {
    let mut stmt = conn.prepare(&statement.sql)?;
    match statement.statement_type {
        StatementType::Select => {
            let column_names: Vec<String> = stmt
                .column_names()
                .iter()
                .map(std::string::ToString::to_string)
                .collect();
            let column_count = column_names.len();
            let mut rows = Vec::new();
            let mut cursor = stmt.query(params_from_iter(params.iter()))?;
            while let Some(row) = cursor.next()? {
                let mut values = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    values.push(from_sqlite_value(row.get::<_, Value>(idx)?));
                }
                rows.push(values);
            }
            Ok(NativeOutcome::success(None, 0, column_names, rows))
        }
        StatementType::Insert => {
            let rows_affected = stmt.execute(params_from_iter(params.iter()))?;
            Ok(NativeOutcome::success(
                Some(conn.last_insert_rowid()),
                rows_affected,
                Vec::new(),
                Vec::new(),
            ))
        }
        StatementType::Update | StatementType::Delete => {
            let rows_affected = stmt.execute(params_from_iter(params.iter()))?;
            Ok(NativeOutcome::success(None, rows_affected, Vec::new(), Vec::new()))
        }
        StatementType::Default => {
            // Step through any rows (e.g. PRAGMA output) and discard them.
            let mut cursor = stmt.query(params_from_iter(params.iter()))?;
            while cursor.next()?.is_some() {}
            Ok(NativeOutcome::success(None, 0, Vec::new(), Vec::new()))
        }
    }
}

fn to_sqlite_value(value: &SqlValue, unescape_text_args: bool) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) if unescape_text_args => Value::Text(unescape_text(s).into_owned()),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

fn from_sqlite_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    fn statement(sql: &str, args: Vec<SqlValue>) -> NativeStatement {
        NativeStatement::from_query(Query::new(sql, args), false)
    }

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory sqlite");
        conn.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .expect("schema");
        conn
    }

    #[test]
    fn insert_reports_rowid_and_select_returns_columns() {
        let conn = memory();
        let inserted = execute_statement(
            &conn,
            &statement("INSERT INTO users (name) VALUES (?)", vec!["ada".into()]),
            false,
            false,
        );
        assert_eq!(inserted.error_message, None);
        assert_eq!(inserted.insert_id, Some(1));
        assert_eq!(inserted.rows_affected, 1);

        let selected = execute_statement(&conn, &statement("SELECT id, name FROM users", vec![]), false, false);
        assert_eq!(selected.column_names, vec!["id", "name"]);
        assert_eq!(
            selected.rows,
            vec![vec![SqlValue::Int(1), SqlValue::Text("ada".into())]]
        );
    }

    #[test]
    fn read_only_rejects_writes() {
        let conn = memory();
        let outcome = execute_statement(
            &conn,
            &statement("INSERT INTO users (name) VALUES ('x')", vec![]),
            true,
            false,
        );
        assert_eq!(outcome.error_message.as_deref(), Some(READ_ONLY_VIOLATION));
    }

    #[test]
    fn sql_errors_become_failure_outcomes() {
        let conn = memory();
        let outcome = execute_statement(&conn, &statement("SELECT * FROM missing", vec![]), false, false);
        assert!(
            outcome
                .error_message
                .as_deref()
                .is_some_and(|msg| msg.contains("no such table"))
        );
    }

    #[test]
    fn unescapes_text_when_configured() {
        let conn = memory();
        let escaped = NativeStatement::from_query(
            Query::new("INSERT INTO users (name) VALUES (?)", vec!["a\u{0}b".into()]),
            true,
        );
        execute_statement(&conn, &escaped, false, true);
        let stored: String = conn
            .query_row("SELECT name FROM users", [], |row| row.get(0))
            .expect("stored name");
        assert_eq!(stored, "a\u{0}b");
    }
}
