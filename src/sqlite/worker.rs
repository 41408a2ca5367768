use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use rusqlite::Connection;
use tokio::sync::oneshot;

use crate::engine::{NativeOutcome, NativeStatement};
use crate::error::SqlSequencerError;

use super::query::execute_statement;

enum Command {
    ExecBatch {
        statements: Vec<NativeStatement>,
        read_only: bool,
        respond_to: oneshot::Sender<Result<Vec<NativeOutcome>, SqlSequencerError>>,
    },
    Shutdown,
}

/// Dedicated thread owning one `SQLite` connection.
pub(super) struct SqliteWorker {
    sender: Sender<Command>,
    name: String,
}

impl SqliteWorker {
    /// Start the worker thread. The connection is opened on that thread, so an open
    /// failure is reported by every later [`SqliteWorker::exec`] call.
    pub(super) fn spawn(
        name: &str,
        path: &Path,
        unescape_text_args: bool,
    ) -> Result<Self, SqlSequencerError> {
        let (sender, receiver) = mpsc::channel::<Command>();
        let path = path.to_path_buf();
        thread::Builder::new()
            .name(format!("sqlite-worker-{name}"))
            .spawn(move || run_sqlite_worker(&path, &receiver, unescape_text_args))
            .map_err(|err| {
                SqlSequencerError::Transport(format!("failed to spawn SQLite worker thread: {err}"))
            })?;

        Ok(Self {
            sender,
            name: name.to_owned(),
        })
    }

    pub(super) async fn exec(
        &self,
        statements: Vec<NativeStatement>,
        read_only: bool,
    ) -> Result<Vec<NativeOutcome>, SqlSequencerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Command::ExecBatch {
                statements,
                read_only,
                respond_to: tx,
            })
            .map_err(|_| SqlSequencerError::Transport(format!("SQLite worker {} closed", self.name)))?;
        rx.await.map_err(|_| {
            SqlSequencerError::Transport(format!(
                "SQLite worker {} dropped while executing batch",
                self.name
            ))
        })?
    }
}

impl Drop for SqliteWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
    }
}

fn run_sqlite_worker(path: &Path, receiver: &Receiver<Command>, unescape_text_args: bool) {
    let conn = Connection::open(path).map_err(|err| {
        SqlSequencerError::Transport(format!(
            "failed to open SQLite database {}: {err}",
            path.display()
        ))
    });
    if let Err(err) = &conn {
        tracing::warn!(error = %err, "sqlite worker could not open its database");
    }

    while let Ok(command) = receiver.recv() {
        match command {
            Command::Shutdown => break,
            Command::ExecBatch {
                statements,
                read_only,
                respond_to,
            } => {
                let outcomes = conn.as_ref().map_err(SqlSequencerError::clone).map(|conn| {
                    statements
                        .iter()
                        .map(|statement| {
                            execute_statement(conn, statement, read_only, unescape_text_args)
                        })
                        .collect()
                });
                let _ = respond_to.send(outcomes);
            }
        }
    }
}
