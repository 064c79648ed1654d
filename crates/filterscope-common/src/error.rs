//! Unified error types for the filterscope workspace.
//!
//! Library crates return [`Result`]; the CLI wraps these in `anyhow`
//! at the command layer.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum FilterscopeError {
    /// Reading a byte range out of the supervised process failed.
    ///
    /// The whole range is considered unread; no partial buffer survives.
    #[error("failed to read {length} bytes at {address:#x} (word at {word_address:#x}): {source}")]
    RemoteRead {
        /// Start of the requested range in the remote address space.
        address: u64,
        /// Length of the requested range in bytes.
        length: usize,
        /// Address of the machine word whose read failed.
        word_address: u64,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The child process could not be launched under supervision.
    #[error("failed to launch {path}")]
    Launch {
        /// Executable that was being launched.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A process-control request against the supervised process failed.
    #[error("{operation} failed for pid {pid}")]
    Ptrace {
        /// Name of the control operation (e.g. `waitpid`, `PTRACE_GETREGS`).
        operation: &'static str,
        /// Process the request targeted.
        pid: i32,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The host platform cannot run the requested operation.
    #[error("unsupported platform: {message}")]
    Unsupported {
        /// Description of the missing capability.
        message: String,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FilterscopeError>;
