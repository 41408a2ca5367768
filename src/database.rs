use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::FutureExt;
use tokio::runtime::Handle;

use crate::config::DatabaseOptions;
use crate::engine::Engine;
use crate::error::SqlSequencerError;
use crate::executor::StatementQueue;
use crate::pending::{PendingBatch, PendingResult, PendingTransaction};
use crate::query::Query;
use crate::transaction::{TransactionBlock, TransactionHandle};
use crate::transaction_queue::TransactionQueue;
use crate::types::SqlValue;

/// State shared by a handle and its queue workers.
pub(crate) struct DatabaseShared {
    name: String,
    engine: Arc<dyn Engine>,
    options: DatabaseOptions,
    closed: AtomicBool,
}

impl DatabaseShared {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub(crate) fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle to one named database.
///
/// Statements are executed in submission order, batched so that only one engine
/// call is in flight at a time. Transactions run one after another. Cloning the
/// handle shares its queues.
///
/// A top-level statement submitted while a transaction is running shares the same
/// statement queue, so the engine may see it between that transaction's own
/// statements. Route statements through the [`TransactionHandle`] when they must be
/// part of the transaction.
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
    statements: StatementQueue,
    transactions: TransactionQueue,
}

impl Database {
    /// Open a database with default options.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::ConfigError`] if `name` is empty or no tokio runtime
    /// is running.
    pub fn open(
        name: impl Into<String>,
        engine: Arc<dyn Engine>,
    ) -> Result<Self, SqlSequencerError> {
        Self::open_with_options(name, engine, DatabaseOptions::default())
    }

    /// Open a database, spawning its statement and transaction workers on the current
    /// tokio runtime.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::ConfigError`] if `name` is empty or no tokio runtime
    /// is running.
    pub fn open_with_options(
        name: impl Into<String>,
        engine: Arc<dyn Engine>,
        options: DatabaseOptions,
    ) -> Result<Self, SqlSequencerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SqlSequencerError::ConfigError(
                "database name must not be empty".into(),
            ));
        }
        let runtime = Handle::try_current().map_err(|err| {
            SqlSequencerError::ConfigError(format!("opening a database requires a tokio runtime: {err}"))
        })?;

        let shared = Arc::new(DatabaseShared {
            name,
            engine,
            options,
            closed: AtomicBool::new(false),
        });
        let statements = StatementQueue::spawn(Arc::clone(&shared), &runtime);
        let transactions = TransactionQueue::spawn(statements.clone(), &runtime);
        tracing::debug!(database = %shared.name, "opened database");

        Ok(Self {
            shared,
            statements,
            transactions,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn options(&self) -> &DatabaseOptions {
        &self.shared.options
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Queue a statement. Accepts a SQL string or a [`Query`].
    pub fn execute_sql(&self, query: impl Into<Query>) -> PendingResult {
        self.statements.execute(query.into())
    }

    /// Queue a SELECT; any other statement kind fails with `TypeMismatch` before queueing.
    pub fn select(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        self.statements.select(sql.into(), args)
    }

    /// Queue an INSERT; any other statement kind fails with `TypeMismatch` before queueing.
    pub fn insert(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        self.statements.insert(sql.into(), args)
    }

    /// Queue an UPDATE or DELETE; any other statement kind fails with `TypeMismatch`
    /// before queueing.
    pub fn update_delete(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        self.statements.update_delete(sql.into(), args)
    }

    /// Submit `queries` as one engine call with the given read-only flag.
    ///
    /// The batch is ordered with the other statements of this handle but never merged
    /// with them. Every per-statement outcome is returned, failures included.
    pub fn exec_batch(&self, queries: Vec<Query>, read_only: bool) -> PendingBatch {
        self.statements.execute_raw(queries, read_only)
    }

    /// Queue a transaction.
    ///
    /// `block` runs after every previously queued transaction has settled, between
    /// `BEGIN EXCLUSIVE` and an automatic `COMMIT`. An error or panic from the block
    /// rolls the transaction back and is returned as
    /// [`SqlSequencerError::TransactionAborted`].
    ///
    /// ```rust,no_run
    /// # use sqlite_sequencer::prelude::*;
    /// # async fn demo(db: Database) -> Result<(), SqlSequencerError> {
    /// db.transaction(|tx| async move {
    ///     tx.insert("INSERT INTO todo (title) VALUES (?)", vec!["write docs".into()])
    ///         .await?;
    ///     Ok::<(), SqlSequencerError>(())
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn transaction<F, Fut>(&self, block: F) -> PendingTransaction
    where
        F: FnOnce(TransactionHandle) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), SqlSequencerError>> + Send + 'static,
    {
        let block: TransactionBlock = Box::new(move |handle| block(handle).boxed());
        self.transactions.start_transaction(block)
    }

    /// Close the handle.
    ///
    /// New requests fail with `ClosedDatabase` as soon as this is called; queued
    /// statements that have not reached the engine fail the same way. The returned
    /// future releases the store in the engine. Closing twice is allowed.
    pub fn close(&self) -> impl Future<Output = Result<(), SqlSequencerError>> + Send + 'static {
        let already_closed = self.shared.closed.swap(true, Ordering::AcqRel);
        if !already_closed {
            tracing::debug!(database = %self.shared.name, "closing database");
        }
        let shared = Arc::clone(&self.shared);
        async move { shared.engine.close_database(&shared.name).await }
    }

    #[cfg(test)]
    pub(crate) fn statement_queue(&self) -> &StatementQueue {
        &self.statements
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .field("options", &self.shared.options)
            .finish()
    }
}
