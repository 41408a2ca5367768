/// Options for a database handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Escape sentinel bytes in text arguments before they reach the engine.
    pub escape_text_args: bool,
    /// Read-only flag passed to the engine with every queued batch.
    pub read_only: bool,
}

impl DatabaseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for the current target. Android bridges serialize arguments through a
    /// string channel, so text escaping is on there.
    #[must_use]
    pub fn platform_default() -> Self {
        Self {
            escape_text_args: cfg!(target_os = "android"),
            read_only: false,
        }
    }

    #[must_use]
    pub fn builder() -> DatabaseOptionsBuilder {
        DatabaseOptionsBuilder::new()
    }
}

/// Fluent builder for [`DatabaseOptions`].
#[derive(Debug, Clone, Default)]
pub struct DatabaseOptionsBuilder {
    opts: DatabaseOptions,
}

impl DatabaseOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            opts: DatabaseOptions::platform_default(),
        }
    }

    #[must_use]
    pub fn escape_text_args(mut self, escape: bool) -> Self {
        self.opts.escape_text_args = escape;
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn finish(self) -> DatabaseOptions {
        self.opts
    }
}
