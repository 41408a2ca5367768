//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types so that a single
//! `use sqlite_sequencer::prelude::*;` is enough to open a handle and run statements.

pub use crate::config::{DatabaseOptions, DatabaseOptionsBuilder};
pub use crate::database::Database;
pub use crate::engine::{Engine, NativeOutcome, NativeStatement};
pub use crate::error::SqlSequencerError;
pub use crate::query::Query;
pub use crate::results::{ResultSet, Row};
pub use crate::statement::{StatementType, classify};
pub use crate::transaction::{TransactionHandle, TransactionState};
pub use crate::types::SqlValue;
pub use crate::websql::WebSqlDatabase;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteEngine, config::SqliteEngineOptions};
