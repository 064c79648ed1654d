//! The process-control surface the interception engine drives.
//!
//! [`Tracee`] abstracts the handful of ptrace operations the engine
//! needs, so the engine can be exercised against scripted fakes. On
//! Linux, [`PtraceProcess`] implements it for a real child.

use filterscope_common::error::Result;
use filterscope_common::types::{ProcessState, SyscallEvent};
use nix::sys::signal::Signal;

use crate::memory::RemoteMemory;

/// Why a blocking wait on the supervised process returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopEvent {
    /// The process exited with the given status code.
    NormalExit(i32),
    /// The process was killed by a signal.
    SignalExit(Signal),
    /// The process stopped at a syscall entry or exit.
    SyscallStop,
    /// Any other stop, with the signal to re-inject on resume, if any.
    OtherStop(Option<Signal>),
}

/// A process under supervision.
pub trait Tracee: RemoteMemory {
    /// Process id, for logging.
    fn pid(&self) -> i32;

    /// Current lifecycle state.
    fn state(&self) -> ProcessState;

    /// Resumes the process until the next syscall boundary, delivering
    /// `signal` if one is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the resume request is rejected.
    fn resume_to_syscall(&mut self, signal: Option<Signal>) -> Result<()>;

    /// Blocks until the process stops or terminates.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait itself fails.
    fn wait_stop(&mut self) -> Result<StopEvent>;

    /// Captures the syscall the process is stopped at.
    ///
    /// # Errors
    ///
    /// Returns an error if the registers cannot be fetched.
    fn syscall_event(&self) -> Result<SyscallEvent>;

    /// Kills the process and reaps it.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be signalled or waited for.
    fn kill_and_reap(&mut self) -> Result<()>;

    /// Stops supervising and lets the process run on its own.
    ///
    /// A process that has already terminated needs no detach.
    ///
    /// # Errors
    ///
    /// Returns an error if the detach request is rejected.
    fn detach(&mut self) -> Result<()>;
}

#[cfg(target_os = "linux")]
pub use self::linux::PtraceProcess;

#[cfg(target_os = "linux")]
mod linux {
    use std::os::unix::process::CommandExt;
    use std::process::Command;

    use filterscope_common::config::TraceConfig;
    use filterscope_common::error::{FilterscopeError, Result};
    use filterscope_common::types::{ProcessState, SyscallEvent};
    use nix::errno::Errno;
    use nix::sys::ptrace;
    use nix::sys::signal::{self, Signal};
    use nix::sys::wait::{WaitStatus, waitpid};
    use nix::unistd::Pid;

    use super::{StopEvent, Tracee};
    use crate::memory::{RemoteMemory, WORD_SIZE};

    /// A child launched under `PTRACE_TRACEME`.
    ///
    /// Owns the child: if it is dropped while still attached to a live
    /// process, the process is killed and reaped.
    #[derive(Debug)]
    pub struct PtraceProcess {
        pid: Pid,
        state: ProcessState,
        attached: bool,
    }

    fn ptrace_error(operation: &'static str, pid: Pid, errno: Errno) -> FilterscopeError {
        FilterscopeError::Ptrace {
            operation,
            pid: pid.as_raw(),
            source: errno.into(),
        }
    }

    impl PtraceProcess {
        /// Launches `config.executable` as a traced child and waits for it
        /// to stop at its first instruction.
        ///
        /// # Errors
        ///
        /// Returns [`FilterscopeError::Launch`] if the executable cannot be
        /// started or dies before its first stop, and
        /// [`FilterscopeError::Ptrace`] if tracing cannot be configured.
        pub fn spawn(config: &TraceConfig) -> Result<Self> {
            let mut command = Command::new(&config.executable);
            let _ = command.args(&config.args);
            // SAFETY: the closure runs in the forked child before exec and
            // only issues the async-signal-safe PTRACE_TRACEME request.
            unsafe {
                let _ = command.pre_exec(|| ptrace::traceme().map_err(std::io::Error::from));
            }
            let child = command.spawn().map_err(|source| FilterscopeError::Launch {
                path: config.executable.clone(),
                source,
            })?;
            #[allow(clippy::cast_possible_wrap)]
            let pid = Pid::from_raw(child.id() as i32);
            tracing::info!(pid = pid.as_raw(), exe = %config.executable.display(), "launched traced child");

            let mut process = Self {
                pid,
                state: ProcessState::Running,
                attached: true,
            };
            match waitpid(pid, None).map_err(|e| ptrace_error("waitpid", pid, e))? {
                WaitStatus::Exited(_, code) => {
                    process.state = ProcessState::Exited;
                    return Err(FilterscopeError::Launch {
                        path: config.executable.clone(),
                        source: std::io::Error::other(format!(
                            "exited with status {code} before the first stop"
                        )),
                    });
                }
                WaitStatus::Signaled(_, sig, _) => {
                    process.state = ProcessState::SignalTerminated;
                    return Err(FilterscopeError::Launch {
                        path: config.executable.clone(),
                        source: std::io::Error::other(format!(
                            "killed by {sig} before the first stop"
                        )),
                    });
                }
                WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
                other => {
                    tracing::warn!(pid = pid.as_raw(), status = ?other, "unexpected initial stop");
                }
            }
            process.state = ProcessState::StoppedAtSyscall;

            // Exec stops arrive as ptrace events, so any SIGTRAP stop seen
            // later is a real signal and can be re-injected.
            ptrace::setoptions(
                pid,
                ptrace::Options::PTRACE_O_TRACESYSGOOD | ptrace::Options::PTRACE_O_TRACEEXEC,
            )
            .map_err(|e| ptrace_error("PTRACE_SETOPTIONS", pid, e))?;
            Ok(process)
        }

        fn reap(&mut self) -> Result<()> {
            loop {
                match waitpid(self.pid, None) {
                    Ok(WaitStatus::Exited(..)) => {
                        self.state = ProcessState::Exited;
                        break;
                    }
                    Ok(WaitStatus::Signaled(..)) => {
                        self.state = ProcessState::SignalTerminated;
                        break;
                    }
                    Ok(_) | Err(Errno::EINTR) => {}
                    Err(Errno::ECHILD) => {
                        self.state = ProcessState::SignalTerminated;
                        break;
                    }
                    Err(e) => return Err(ptrace_error("waitpid", self.pid, e)),
                }
            }
            self.attached = false;
            Ok(())
        }
    }

    impl RemoteMemory for PtraceProcess {
        fn read_word(&self, address: u64) -> std::io::Result<[u8; WORD_SIZE]> {
            #[allow(clippy::cast_possible_truncation)]
            let addr = address as usize as ptrace::AddressType;
            ptrace::read(self.pid, addr)
                .map(|word: libc::c_long| word.to_ne_bytes())
                .map_err(std::io::Error::from)
        }
    }

    impl Tracee for PtraceProcess {
        fn pid(&self) -> i32 {
            self.pid.as_raw()
        }

        fn state(&self) -> ProcessState {
            self.state
        }

        fn resume_to_syscall(&mut self, signal: Option<Signal>) -> Result<()> {
            ptrace::syscall(self.pid, signal)
                .map_err(|e| ptrace_error("PTRACE_SYSCALL", self.pid, e))?;
            self.state = ProcessState::Running;
            Ok(())
        }

        fn wait_stop(&mut self) -> Result<StopEvent> {
            let status = waitpid(self.pid, None).map_err(|e| ptrace_error("waitpid", self.pid, e))?;
            let event = match status {
                WaitStatus::Exited(_, code) => {
                    self.state = ProcessState::Exited;
                    self.attached = false;
                    StopEvent::NormalExit(code)
                }
                WaitStatus::Signaled(_, sig, _) => {
                    self.state = ProcessState::SignalTerminated;
                    self.attached = false;
                    StopEvent::SignalExit(sig)
                }
                WaitStatus::PtraceSyscall(_) => {
                    self.state = ProcessState::StoppedAtSyscall;
                    StopEvent::SyscallStop
                }
                WaitStatus::Stopped(_, sig) => {
                    self.state = ProcessState::StoppedAtSyscall;
                    StopEvent::OtherStop(Some(sig))
                }
                WaitStatus::PtraceEvent(..) => {
                    self.state = ProcessState::StoppedAtSyscall;
                    StopEvent::OtherStop(None)
                }
                _ => StopEvent::OtherStop(None),
            };
            Ok(event)
        }

        #[cfg(target_arch = "x86_64")]
        fn syscall_event(&self) -> Result<SyscallEvent> {
            let regs =
                ptrace::getregs(self.pid).map_err(|e| ptrace_error("PTRACE_GETREGS", self.pid, e))?;
            Ok(SyscallEvent::new(
                regs.orig_rax,
                [regs.rdi, regs.rsi, regs.rdx, regs.r10, regs.r8, regs.r9],
            ))
        }

        #[cfg(not(target_arch = "x86_64"))]
        fn syscall_event(&self) -> Result<SyscallEvent> {
            Err(FilterscopeError::Unsupported {
                message: "syscall capture is only implemented for x86_64".into(),
            })
        }

        fn kill_and_reap(&mut self) -> Result<()> {
            if self.state.is_terminated() {
                return Ok(());
            }
            match signal::kill(self.pid, Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => return Err(ptrace_error("kill", self.pid, e)),
            }
            self.reap()?;
            tracing::debug!(pid = self.pid.as_raw(), "child killed and reaped");
            Ok(())
        }

        fn detach(&mut self) -> Result<()> {
            if self.state.is_terminated() || !self.attached {
                self.attached = false;
                return Ok(());
            }
            ptrace::detach(self.pid, None)
                .map_err(|e| ptrace_error("PTRACE_DETACH", self.pid, e))?;
            self.attached = false;
            self.state = ProcessState::Running;
            tracing::debug!(pid = self.pid.as_raw(), "detached from child");
            Ok(())
        }
    }

    impl Drop for PtraceProcess {
        fn drop(&mut self) {
            if self.attached && !self.state.is_terminated() {
                tracing::debug!(pid = self.pid.as_raw(), "releasing child on drop");
                if let Err(error) = self.kill_and_reap() {
                    tracing::warn!(pid = self.pid.as_raw(), ?error, "failed to release child");
                }
            }
        }
    }
}
