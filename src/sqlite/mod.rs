// SQLite engine - runs statement batches against rusqlite connections
//
// - config: engine options and builder
// - worker: one dedicated thread per open database, fed through a command channel
// - query: per-statement execution and value conversion

pub mod config;
mod query;
mod worker;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::engine::{Engine, NativeOutcome, NativeStatement};
use crate::error::SqlSequencerError;

pub use config::{SqliteEngineOptions, SqliteEngineOptionsBuilder};

use worker::SqliteWorker;

/// [`Engine`] backed by rusqlite.
///
/// Database names map to files under the configured base directory. A database is
/// opened (and created if missing) on its first batch and stays open until
/// [`Engine::close_database`].
pub struct SqliteEngine {
    options: SqliteEngineOptions,
    workers: Mutex<HashMap<String, Arc<SqliteWorker>>>,
}

impl SqliteEngine {
    #[must_use]
    pub fn new(options: SqliteEngineOptions) -> Self {
        Self {
            options,
            workers: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn builder(base_dir: impl Into<std::path::PathBuf>) -> SqliteEngineOptionsBuilder {
        SqliteEngineOptionsBuilder::new(base_dir)
    }

    #[must_use]
    pub fn options(&self) -> &SqliteEngineOptions {
        &self.options
    }

    fn workers(&self) -> MutexGuard<'_, HashMap<String, Arc<SqliteWorker>>> {
        match self.workers.lock() {
            Ok(guard) => guard,
            // Clear the poison and continue with the recovered data
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn worker_for(&self, database: &str) -> Result<Arc<SqliteWorker>, SqlSequencerError> {
        let mut workers = self.workers();
        if let Some(worker) = workers.get(database) {
            return Ok(Arc::clone(worker));
        }
        let path = self.options.path_for(database)?;
        let worker = Arc::new(SqliteWorker::spawn(
            database,
            &path,
            self.options.unescape_text_args,
        )?);
        workers.insert(database.to_owned(), Arc::clone(&worker));
        tracing::debug!(database, path = %path.display(), "opened sqlite database");
        Ok(worker)
    }
}

impl fmt::Debug for SqliteEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteEngine")
            .field("options", &self.options)
            .field("open_databases", &self.workers().len())
            .finish()
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn submit_batch(
        &self,
        database: &str,
        statements: Vec<NativeStatement>,
        read_only: bool,
    ) -> Result<Vec<NativeOutcome>, SqlSequencerError> {
        let worker = self.worker_for(database)?;
        worker.exec(statements, read_only).await
    }

    async fn close_database(&self, database: &str) -> Result<(), SqlSequencerError> {
        // Dropping the last handle to the worker shuts its thread down.
        let removed = self.workers().remove(database);
        if removed.is_some() {
            tracing::debug!(database, "closed sqlite database");
        }
        Ok(())
    }
}
