use std::path::{Component, Path, PathBuf};

use crate::error::SqlSequencerError;

use super::SqliteEngine;

/// Options for configuring a [`SqliteEngine`].
#[derive(Debug, Clone)]
pub struct SqliteEngineOptions {
    /// Directory holding one file per database name.
    pub base_dir: PathBuf,
    /// Undo the sentinel escaping of text arguments before binding them.
    pub unescape_text_args: bool,
}

impl SqliteEngineOptions {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            unescape_text_args: false,
        }
    }

    /// File path for `name`, which must be a plain file name.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::ConfigError`] if `name` is empty or contains path
    /// separators or parent references.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SqlSequencerError> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.base_dir.join(name)),
            _ => Err(SqlSequencerError::ConfigError(format!(
                "invalid database name: {name:?}"
            ))),
        }
    }
}

/// Fluent builder for [`SqliteEngineOptions`].
#[derive(Debug, Clone)]
pub struct SqliteEngineOptionsBuilder {
    opts: SqliteEngineOptions,
}

impl SqliteEngineOptionsBuilder {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            opts: SqliteEngineOptions::new(base_dir),
        }
    }

    #[must_use]
    pub fn unescape_text_args(mut self, unescape: bool) -> Self {
        self.opts.unescape_text_args = unescape;
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteEngineOptions {
        self.opts
    }

    /// Create the base directory if needed and build the engine.
    ///
    /// # Errors
    /// Returns [`SqlSequencerError::ConfigError`] if the directory cannot be created.
    pub fn build(self) -> Result<SqliteEngine, SqlSequencerError> {
        let opts = self.finish();
        std::fs::create_dir_all(&opts.base_dir).map_err(|err| {
            SqlSequencerError::ConfigError(format!(
                "failed to create database directory {}: {err}",
                opts.base_dir.display()
            ))
        })?;
        Ok(SqliteEngine::new(opts))
    }
}
