//! Ordered, single-flight statement and transaction queueing over an embedded SQL engine.
//!
//! A [`Database`] handle serializes every statement submitted through it: statements
//! reach the [`Engine`] in submission order, batched so that at most one engine call
//! is in flight, and each caller receives its own statement's outcome. Transactions
//! run one at a time between `BEGIN EXCLUSIVE` and `COMMIT` or `ROLLBACK`.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sqlite_sequencer::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlSequencerError> {
//! let engine = Arc::new(SqliteEngine::builder("/tmp/app-data").build()?);
//! let db = Database::open("todo.db", engine)?;
//!
//! db.execute_sql("CREATE TABLE IF NOT EXISTS todo (id INTEGER PRIMARY KEY, title TEXT)")
//!     .await?;
//! let inserted = db
//!     .insert("INSERT INTO todo (title) VALUES (?)", vec!["ship it".into()])
//!     .await?;
//! assert!(inserted.insert_id.is_some());
//!
//! let rows = db.select("SELECT id, title FROM todo", vec![]).await?;
//! for row in &rows.rows {
//!     println!("{:?}", row.get("title"));
//! }
//! db.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod engine;
pub mod error;
mod executor;
pub mod pending;
pub mod prelude;
pub mod query;
pub mod results;
pub mod statement;
pub mod transaction;
mod transaction_queue;
pub mod types;
pub mod websql;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{DatabaseOptions, DatabaseOptionsBuilder};
pub use database::Database;
pub use engine::{Engine, NativeOutcome, NativeStatement};
pub use error::SqlSequencerError;
pub use pending::{Pending, PendingBatch, PendingResult, PendingTransaction};
pub use query::Query;
pub use results::{ResultSet, Row};
pub use statement::{StatementType, classify, escape_text, unescape_text};
pub use transaction::{TransactionHandle, TransactionState};
pub use types::SqlValue;
pub use websql::{WebSqlDatabase, WebSqlResultSet, WebSqlRows, WebSqlTransaction};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteEngine, config::SqliteEngineOptions};
