//! Statement queue and batch executor.
//!
//! Every handle owns one unbounded channel of statement commands and one tokio task
//! draining it. The task is the only consumer, so at most one batch per handle is
//! ever in flight with the engine. Each drain takes everything queued at that
//! moment; statements arriving while the engine works form the next batch.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::database::DatabaseShared;
use crate::engine::NativeStatement;
use crate::error::SqlSequencerError;
use crate::pending::{Pending, PendingBatch, PendingResult};
use crate::query::Query;
use crate::results::ResultSet;
use crate::statement::StatementType;
use crate::types::SqlValue;

type StatementOutcome = Result<ResultSet, SqlSequencerError>;

pub(crate) struct StatementTask {
    query: Query,
    respond_to: oneshot::Sender<StatementOutcome>,
}

pub(crate) struct RawBatchTask {
    queries: Vec<Query>,
    read_only: bool,
    respond_to: oneshot::Sender<Result<Vec<StatementOutcome>, SqlSequencerError>>,
}

pub(crate) enum StatementCommand {
    Execute(StatementTask),
    RawBatch(RawBatchTask),
}

/// Sending side of a handle's statement queue.
#[derive(Clone)]
pub(crate) struct StatementQueue {
    sender: mpsc::UnboundedSender<StatementCommand>,
    shared: Arc<DatabaseShared>,
}

impl StatementQueue {
    pub(crate) fn spawn(shared: Arc<DatabaseShared>, runtime: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_batch_executor(Arc::clone(&shared), receiver));
        Self { sender, shared }
    }

    pub(crate) fn shared(&self) -> &Arc<DatabaseShared> {
        &self.shared
    }

    /// Queue one statement. Fails without queueing if the handle is closed.
    pub(crate) fn execute(&self, query: Query) -> PendingResult {
        if self.shared.is_closed() {
            return Pending::failed(SqlSequencerError::closed(self.shared.name()));
        }
        let (respond_to, receiver) = oneshot::channel();
        let command = StatementCommand::Execute(StatementTask { query, respond_to });
        if self.sender.send(command).is_err() {
            return Pending::failed(executor_stopped());
        }
        Pending::waiting(receiver)
    }

    /// Queue one statement after checking its kind with `accepts`.
    pub(crate) fn execute_checked(
        &self,
        sql: String,
        args: Vec<SqlValue>,
        expected: &'static str,
        accepts: fn(StatementType) -> bool,
    ) -> PendingResult {
        let query = Query::new(sql, args);
        if !accepts(query.statement_type()) {
            return Pending::failed(SqlSequencerError::TypeMismatch {
                expected,
                sql: query.sql().to_owned(),
            });
        }
        self.execute(query)
    }

    pub(crate) fn select(&self, sql: String, args: Vec<SqlValue>) -> PendingResult {
        self.execute_checked(sql, args, "SELECT", |kind| kind == StatementType::Select)
    }

    pub(crate) fn insert(&self, sql: String, args: Vec<SqlValue>) -> PendingResult {
        self.execute_checked(sql, args, "INSERT", |kind| kind == StatementType::Insert)
    }

    pub(crate) fn update_delete(&self, sql: String, args: Vec<SqlValue>) -> PendingResult {
        self.execute_checked(
            sql,
            args,
            "UPDATE or DELETE",
            StatementType::is_update_or_delete,
        )
    }

    /// Queue a caller-assembled batch that is submitted as its own engine call.
    pub(crate) fn execute_raw(&self, queries: Vec<Query>, read_only: bool) -> PendingBatch {
        if self.shared.is_closed() {
            return Pending::failed(SqlSequencerError::closed(self.shared.name()));
        }
        let (respond_to, receiver) = oneshot::channel();
        let command = StatementCommand::RawBatch(RawBatchTask {
            queries,
            read_only,
            respond_to,
        });
        if self.sender.send(command).is_err() {
            return Pending::failed(executor_stopped());
        }
        Pending::waiting(receiver)
    }
}

fn executor_stopped() -> SqlSequencerError {
    SqlSequencerError::Transport("batch executor stopped".into())
}

async fn run_batch_executor(
    shared: Arc<DatabaseShared>,
    mut receiver: mpsc::UnboundedReceiver<StatementCommand>,
) {
    while let Some(first) = receiver.recv().await {
        let mut drained = vec![first];
        while let Ok(command) = receiver.try_recv() {
            drained.push(command);
        }

        let mut batch: Vec<StatementTask> = Vec::new();
        for command in drained {
            match command {
                StatementCommand::Execute(task) => batch.push(task),
                StatementCommand::RawBatch(task) => {
                    // Raw batches keep their own engine call; flush what precedes them.
                    if !batch.is_empty() {
                        run_statement_batch(&shared, std::mem::take(&mut batch)).await;
                    }
                    run_raw_batch(&shared, task).await;
                }
            }
        }
        if !batch.is_empty() {
            run_statement_batch(&shared, batch).await;
        }
    }
    tracing::debug!(database = %shared.name(), "batch executor stopped");
}

async fn run_statement_batch(shared: &DatabaseShared, tasks: Vec<StatementTask>) {
    let (queries, responders): (Vec<Query>, Vec<_>) = tasks
        .into_iter()
        .map(|task| (task.query, task.respond_to))
        .unzip();

    match submit(shared, queries, shared.options().read_only).await {
        Ok(outcomes) => {
            for (respond_to, outcome) in responders.into_iter().zip(outcomes) {
                let _ = respond_to.send(outcome);
            }
        }
        Err(err) => {
            for respond_to in responders {
                let _ = respond_to.send(Err(err.clone()));
            }
        }
    }
}

async fn run_raw_batch(shared: &DatabaseShared, task: RawBatchTask) {
    let outcome = if task.queries.is_empty() {
        Ok(Vec::new())
    } else {
        submit(shared, task.queries, task.read_only).await
    };
    let _ = task.respond_to.send(outcome);
}

/// Submit one batch and align the engine's outcomes with the submitted statements.
async fn submit(
    shared: &DatabaseShared,
    queries: Vec<Query>,
    read_only: bool,
) -> Result<Vec<StatementOutcome>, SqlSequencerError> {
    if shared.is_closed() {
        return Err(SqlSequencerError::closed(shared.name()));
    }

    let escape = shared.options().escape_text_args;
    let statements: Vec<NativeStatement> = queries
        .into_iter()
        .map(|query| NativeStatement::from_query(query, escape))
        .collect();
    let expected = statements.len();
    tracing::debug!(
        database = %shared.name(),
        statements = expected,
        read_only,
        "submitting batch"
    );

    let call = shared
        .engine()
        .submit_batch(shared.name(), statements, read_only);
    let outcomes = match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(outcomes)) => outcomes,
        Ok(Err(err)) => {
            tracing::warn!(database = %shared.name(), error = %err, "batch submission failed");
            return Err(err);
        }
        Err(payload) => {
            let message = format!("engine panicked: {}", panic_message(payload.as_ref()));
            tracing::warn!(database = %shared.name(), "{message}");
            return Err(SqlSequencerError::Transport(message));
        }
    };

    if outcomes.len() != expected {
        tracing::warn!(
            database = %shared.name(),
            expected,
            received = outcomes.len(),
            "engine outcomes do not line up with the batch"
        );
        return Err(SqlSequencerError::Transport(format!(
            "engine returned {} outcomes for {expected} statements",
            outcomes.len()
        )));
    }

    Ok(outcomes
        .into_iter()
        .map(crate::engine::NativeOutcome::into_result)
        .collect())
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
