//! Run configuration for a single supervision session.

use std::path::PathBuf;

/// What to launch under supervision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    /// Executable to launch. Resolved through `PATH` when it has no slash.
    pub executable: PathBuf,
    /// Arguments passed to the child after `argv[0]`.
    pub args: Vec<String>,
}

impl TraceConfig {
    /// Creates a configuration that launches `executable` with no arguments.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
        }
    }

    /// Appends child arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}
