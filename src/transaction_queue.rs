use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::error::SqlSequencerError;
use crate::executor::StatementQueue;
use crate::pending::{Pending, PendingTransaction};
use crate::transaction::{Transaction, TransactionBlock};

struct TransactionTask {
    block: TransactionBlock,
    respond_to: oneshot::Sender<Result<(), SqlSequencerError>>,
}

/// Sending side of a handle's transaction queue.
///
/// One runner task per handle takes a task, runs it to completion (commit or
/// rollback included), answers it, and only then takes the next one.
#[derive(Clone)]
pub(crate) struct TransactionQueue {
    sender: mpsc::UnboundedSender<TransactionTask>,
    statements: StatementQueue,
}

impl TransactionQueue {
    pub(crate) fn spawn(statements: StatementQueue, runtime: &Handle) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        runtime.spawn(run_transactions(statements.clone(), receiver));
        Self { sender, statements }
    }

    pub(crate) fn start_transaction(&self, block: TransactionBlock) -> PendingTransaction {
        let shared = self.statements.shared();
        if shared.is_closed() {
            return Pending::failed(SqlSequencerError::closed(shared.name()));
        }
        let (respond_to, receiver) = oneshot::channel();
        if self
            .sender
            .send(TransactionTask { block, respond_to })
            .is_err()
        {
            return Pending::failed(SqlSequencerError::Transport(
                "transaction runner stopped".into(),
            ));
        }
        Pending::waiting(receiver)
    }
}

async fn run_transactions(
    statements: StatementQueue,
    mut receiver: mpsc::UnboundedReceiver<TransactionTask>,
) {
    while let Some(task) = receiver.recv().await {
        let transaction = Transaction::new(statements.clone());
        let result = transaction.run(task.block).await;
        if let Err(err) = &result {
            tracing::debug!(
                database = %statements.shared().name(),
                error = %err,
                "transaction failed"
            );
        }
        let _ = task.respond_to.send(result);
    }
}
