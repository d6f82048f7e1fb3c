//! Unit of work configuration.

/// Unit of work configuration options.
#[derive(Debug, Clone)]
pub struct UnitOfWorkConfig {
    /// Name used in log spans and run reports.
    pub name: String,
    /// Log every begin, commit and rollback at debug level instead of trace.
    pub verbose: bool,
    /// Recover panics raised by a resource's `begin`.
    ///
    /// When disabled, the panic resumes unwinding once the transactions
    /// begun before it have been rolled back.
    pub catch_begin_panics: bool,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            name: "unit_of_work".to_string(),
            verbose: false,
            catch_begin_panics: true,
        }
    }
}

impl UnitOfWorkConfig {
    /// Create a new configuration with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set verbose flag.
    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Set catch_begin_panics flag.
    pub fn catch_begin_panics(mut self, value: bool) -> Self {
        self.catch_begin_panics = value;
        self
    }
}
