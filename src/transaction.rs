//! Single transaction: BEGIN, the caller's block, then COMMIT or ROLLBACK.
//!
//! Control statements travel through the owning handle's statement queue like any
//! other statement, so they stay in submission order with the block's statements.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::SqlSequencerError;
use crate::executor::{StatementQueue, panic_message};
use crate::pending::{Pending, PendingResult};
use crate::query::Query;
use crate::types::SqlValue;

const BEGIN_SQL: &str = "BEGIN EXCLUSIVE;";
const COMMIT_SQL: &str = "COMMIT;";
const ROLLBACK_SQL: &str = "ROLLBACK;";

/// Boxed transaction block as stored in the transaction queue.
pub(crate) type TransactionBlock =
    Box<dyn FnOnce(TransactionHandle) -> BoxFuture<'static, Result<(), SqlSequencerError>> + Send>;

/// Lifecycle of a transaction. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NotStarted,
    Pending,
    Committed,
    RolledBack,
}

impl TransactionState {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }

    fn to_code(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Pending => 1,
            Self::Committed => 2,
            Self::RolledBack => 3,
        }
    }

    fn from_code(code: u8) -> Self {
        match code {
            1 => Self::Pending,
            2 => Self::Committed,
            3 => Self::RolledBack,
            _ => Self::NotStarted,
        }
    }
}

struct TransactionInner {
    statements: StatementQueue,
    state: AtomicU8,
    // Serializes COMMIT/ROLLBACK so a transaction finishes exactly once.
    finish_lock: Mutex<()>,
}

impl TransactionInner {
    fn state(&self) -> TransactionState {
        TransactionState::from_code(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: TransactionState) {
        self.state.store(state.to_code(), Ordering::Release);
    }

    async fn finish(&self, sql: &str, terminal: TransactionState) -> Result<(), SqlSequencerError> {
        let _guard = self.finish_lock.lock().await;
        if self.state().is_finished() {
            return Ok(());
        }
        self.statements.execute(Query::without_args(sql)).await?;
        self.set_state(terminal);
        tracing::debug!(
            database = %self.statements.shared().name(),
            state = ?terminal,
            "transaction finished"
        );
        Ok(())
    }
}

/// One BEGIN…COMMIT/ROLLBACK unit bound to a database handle.
pub(crate) struct Transaction {
    inner: Arc<TransactionInner>,
}

impl Transaction {
    pub(crate) fn new(statements: StatementQueue) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                statements,
                state: AtomicU8::new(TransactionState::NotStarted.to_code()),
                finish_lock: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub(crate) fn state(&self) -> TransactionState {
        self.inner.state()
    }

    /// Run `block` inside the transaction.
    ///
    /// The block is skipped entirely when BEGIN fails. After the block, COMMIT is
    /// issued unless the block already finished the transaction. A block error, a
    /// panic, or a failed COMMIT triggers ROLLBACK.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::TransactionBegin`] if BEGIN failed and
    /// [`SqlSequencerError::TransactionAborted`] wrapping the original error if the
    /// transaction was rolled back.
    pub(crate) async fn run(&self, block: TransactionBlock) -> Result<(), SqlSequencerError> {
        if self.state() != TransactionState::NotStarted {
            return Err(SqlSequencerError::Other(
                "transaction has already been started".into(),
            ));
        }

        let database = self.inner.statements.shared().name().to_owned();
        if let Err(err) = self
            .inner
            .statements
            .execute(Query::without_args(BEGIN_SQL))
            .await
        {
            tracing::debug!(%database, error = %err, "could not begin transaction");
            return Err(SqlSequencerError::TransactionBegin(Box::new(err)));
        }
        self.inner.set_state(TransactionState::Pending);
        tracing::debug!(%database, "transaction started");

        let handle = TransactionHandle {
            inner: Arc::clone(&self.inner),
        };
        let outcome = match AssertUnwindSafe(async move { block(handle).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(SqlSequencerError::Other(format!(
                "transaction block panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        let outcome = match outcome {
            Ok(()) => {
                self.inner
                    .finish(COMMIT_SQL, TransactionState::Committed)
                    .await
            }
            Err(err) => Err(err),
        };

        if let Err(err) = outcome {
            if let Err(rollback_err) = self
                .inner
                .finish(ROLLBACK_SQL, TransactionState::RolledBack)
                .await
            {
                tracing::warn!(%database, error = %rollback_err, "rollback failed");
                // Terminal even when ROLLBACK fails, so the handle stops accepting statements.
                self.inner.set_state(TransactionState::RolledBack);
            }
            return Err(SqlSequencerError::TransactionAborted(Box::new(err)));
        }
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state())
            .finish()
    }
}

/// Handle passed to a transaction block.
///
/// Statements go through the owning database's statement queue. Once the
/// transaction is committed or rolled back, statement calls fail with
/// [`SqlSequencerError::TransactionFinished`] and `commit`/`rollback` do nothing.
#[derive(Clone)]
pub struct TransactionHandle {
    inner: Arc<TransactionInner>,
}

impl TransactionHandle {
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.inner.state()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    pub fn execute_sql(&self, query: impl Into<Query>) -> PendingResult {
        if self.is_finished() {
            return Pending::failed(SqlSequencerError::TransactionFinished);
        }
        self.inner.statements.execute(query.into())
    }

    pub fn select(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        if self.is_finished() {
            return Pending::failed(SqlSequencerError::TransactionFinished);
        }
        self.inner.statements.select(sql.into(), args)
    }

    pub fn insert(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        if self.is_finished() {
            return Pending::failed(SqlSequencerError::TransactionFinished);
        }
        self.inner.statements.insert(sql.into(), args)
    }

    pub fn update_delete(&self, sql: impl Into<String>, args: Vec<SqlValue>) -> PendingResult {
        if self.is_finished() {
            return Pending::failed(SqlSequencerError::TransactionFinished);
        }
        self.inner.statements.update_delete(sql.into(), args)
    }

    /// Commit now. No-op if the transaction already finished.
    ///
    /// # Errors
    /// Returns the COMMIT statement's error; the transaction then stays pending and
    /// is rolled back when the block returns.
    pub async fn commit(&self) -> Result<(), SqlSequencerError> {
        self.inner
            .finish(COMMIT_SQL, TransactionState::Committed)
            .await
    }

    /// Roll back now. No-op if the transaction already finished.
    ///
    /// # Errors
    /// Returns the ROLLBACK statement's error.
    pub async fn rollback(&self) -> Result<(), SqlSequencerError> {
        self.inner
            .finish(ROLLBACK_SQL, TransactionState::RolledBack)
            .await
    }
}

impl fmt::Debug for TransactionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("state", &self.state())
            .finish()
    }
}
