//! Syscall interception engine.
//!
//! Drives a [`Tracee`] from one syscall boundary to the next until it
//! either installs a seccomp filter or terminates. The first install is
//! captured and the process is killed; if none happens the process is
//! released unharmed.

use std::fmt;

use filterscope_common::error::Result;
use filterscope_common::types::ProcessState;

use crate::dump::{self, FilterProgram};
use crate::signature::{self, FilterInstall};
use crate::tracee::{StopEvent, Tracee};

/// Where the engine is in its run.
///
/// There is no "not attached" state: holding an [`Interceptor`] means a
/// process is already under supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// A process is attached but has not been resumed yet.
    Attached,
    /// Resuming and waiting for syscall stops.
    AwaitingSyscallStop,
    /// A filter-install call was seen and captured.
    Matched,
    /// The process terminated without installing a filter.
    Finished,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attached => write!(f, "attached"),
            Self::AwaitingSyscallStop => write!(f, "awaiting-syscall-stop"),
            Self::Matched => write!(f, "matched"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// A captured filter-install call.
#[derive(Debug)]
pub struct Capture {
    /// The call and the program pointer it passed.
    pub install: FilterInstall,
    /// The program read from that pointer, or the header read failure.
    pub program: Result<FilterProgram>,
}

/// How a supervision run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The process tried to install a filter; it has been killed.
    Captured(Capture),
    /// The process terminated without installing a filter.
    NotFound {
        /// How the process ended.
        exit: ProcessState,
    },
}

/// The interception engine. Owns the supervised process for the run.
pub struct Interceptor<T: Tracee> {
    tracee: T,
    state: EngineState,
}

impl<T: Tracee> Interceptor<T> {
    /// Takes ownership of an attached process.
    pub fn new(tracee: T) -> Self {
        tracing::debug!(pid = tracee.pid(), "engine attached");
        Self {
            tracee,
            state: EngineState::Attached,
        }
    }

    /// Current engine state.
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Runs until the first filter install or process termination.
    ///
    /// Blocks for as long as the process runs. On a capture the process
    /// is killed and reaped; otherwise it is detached.
    ///
    /// # Errors
    ///
    /// Returns an error only if waiting for the process fails. The
    /// process is released when the engine is dropped.
    pub fn run(mut self) -> Result<Outcome> {
        let pid = self.tracee.pid();
        self.transition(EngineState::AwaitingSyscallStop);
        let mut pending = None;

        loop {
            if let Err(error) = self.tracee.resume_to_syscall(pending.take()) {
                tracing::debug!(pid, ?error, "resume failed");
            }
            match self.tracee.wait_stop()? {
                StopEvent::NormalExit(code) => {
                    tracing::info!(pid, code, "child exited");
                    return Ok(self.finish());
                }
                StopEvent::SignalExit(signal) => {
                    tracing::info!(pid, %signal, "child killed by signal");
                    return Ok(self.finish());
                }
                StopEvent::OtherStop(signal) => {
                    tracing::trace!(pid, ?signal, "non-syscall stop");
                    pending = signal;
                }
                StopEvent::SyscallStop => {
                    let event = match self.tracee.syscall_event() {
                        Ok(event) => event,
                        Err(error) => {
                            tracing::warn!(pid, ?error, "could not read syscall registers");
                            continue;
                        }
                    };
                    tracing::trace!(pid, nr = event.number, "syscall stop");
                    if let Some(install) = signature::recognize(&event) {
                        return Ok(self.capture(install));
                    }
                }
            }
        }
    }

    fn capture(mut self, install: FilterInstall) -> Outcome {
        self.transition(EngineState::Matched);
        tracing::info!(
            pid = self.tracee.pid(),
            call = %install.call,
            program = install.program,
            "intercepted filter install"
        );
        let program = dump::materialize(&self.tracee, install.program);
        if let Err(error) = self.tracee.kill_and_reap() {
            tracing::warn!(pid = self.tracee.pid(), ?error, "failed to kill child");
        }
        Outcome::Captured(Capture { install, program })
    }

    fn finish(mut self) -> Outcome {
        self.transition(EngineState::Finished);
        if let Err(error) = self.tracee.detach() {
            tracing::debug!(pid = self.tracee.pid(), ?error, "detach failed");
        }
        Outcome::NotFound {
            exit: self.tracee.state(),
        }
    }

    fn transition(&mut self, next: EngineState) {
        tracing::debug!(from = %self.state, to = %next, "engine state");
        self.state = next;
    }
}
