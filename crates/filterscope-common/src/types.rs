//! Domain primitive types used across the filterscope workspace.

use std::fmt;

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    /// The process is executing (or has been resumed and not yet stopped).
    Running,
    /// The process is halted at a syscall boundary or signal-delivery stop.
    StoppedAtSyscall,
    /// The process exited normally.
    Exited,
    /// The process was terminated by a signal.
    SignalTerminated,
}

impl ProcessState {
    /// Returns `true` once the process has terminated and been reaped.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Exited | Self::SignalTerminated)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::StoppedAtSyscall => write!(f, "stopped"),
            Self::Exited => write!(f, "exited"),
            Self::SignalTerminated => write!(f, "signaled"),
        }
    }
}

/// Syscall number and arguments captured at a syscall boundary.
///
/// Produced fresh at every stop and never retained past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallEvent {
    /// Syscall number as seen by the kernel.
    pub number: u64,
    /// Raw argument registers, in calling-convention order.
    pub args: [u64; 6],
}

impl SyscallEvent {
    /// Creates an event from a syscall number and its arguments.
    #[must_use]
    pub const fn new(number: u64, args: [u64; 6]) -> Self {
        Self { number, args }
    }

    /// Returns argument `index` (zero-based), or `None` past the sixth.
    #[must_use]
    pub fn arg(&self, index: usize) -> Option<u64> {
        self.args.get(index).copied()
    }
}
