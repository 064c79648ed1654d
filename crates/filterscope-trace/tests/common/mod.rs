//! In-memory stand-ins for a supervised process.

#![allow(dead_code, clippy::expect_used)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use filterscope_bpf::insn::SockFilter;
use filterscope_bpf::program::ProgramHeader;
use filterscope_common::error::{FilterscopeError, Result};
use filterscope_common::types::{ProcessState, SyscallEvent};
use filterscope_trace::memory::{RemoteMemory, WORD_SIZE};
use filterscope_trace::tracee::{StopEvent, Tracee};
use nix::sys::signal::Signal;

/// Address-space image made of word-aligned mapped regions.
#[derive(Debug, Default, Clone)]
pub struct FakeMemory {
    regions: Vec<(u64, Vec<u8>)>,
}

impl FakeMemory {
    /// Maps `bytes` at `base`, zero-padding the region to a whole word.
    pub fn map(mut self, base: u64, bytes: &[u8]) -> Self {
        let mut padded = bytes.to_vec();
        padded.resize(bytes.len().div_ceil(WORD_SIZE) * WORD_SIZE, 0);
        self.regions.push((base, padded));
        self
    }

    /// Maps a `sock_fprog` at `at` announcing `len` instructions, and
    /// `insns` at `filter`. Passing fewer than `len` instructions leaves
    /// the rest unmapped.
    pub fn with_program(
        self,
        at: u64,
        len: u16,
        filter: u64,
        insns: &[SockFilter],
    ) -> Self {
        let header = ProgramHeader { len, filter }
            .encode()
            .expect("filter address fits a pointer");
        let body: Vec<u8> = insns.iter().flat_map(SockFilter::encode).collect();
        self.map(at, &header).map(filter, &body)
    }
}

impl RemoteMemory for FakeMemory {
    fn read_word(&self, address: u64) -> std::io::Result<[u8; WORD_SIZE]> {
        for (base, bytes) in &self.regions {
            let Some(offset) = address.checked_sub(*base) else {
                continue;
            };
            let Ok(offset) = usize::try_from(offset) else {
                continue;
            };
            if let Some(slice) = bytes.get(offset..offset + WORD_SIZE) {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(slice);
                return Ok(word);
            }
        }
        Err(std::io::Error::from_raw_os_error(libc::EFAULT))
    }
}

/// Process-control requests the engine made, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Resume(Option<Signal>),
    Kill,
    Detach,
}

/// One scripted stop: what `wait_stop` reports and, for syscall stops,
/// what `syscall_event` returns.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Syscall(SyscallEvent),
    UnreadableSyscall,
    Signal(Signal),
    Exit(i32),
    Killed(Signal),
}

/// A tracee that replays a fixed list of stops.
pub struct ScriptedTracee {
    memory: FakeMemory,
    steps: VecDeque<Step>,
    current: Option<Step>,
    state: ProcessState,
    log: Rc<RefCell<Vec<Request>>>,
}

impl ScriptedTracee {
    pub fn new(memory: FakeMemory, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            memory,
            steps: steps.into_iter().collect(),
            current: None,
            state: ProcessState::StoppedAtSyscall,
            log: Rc::default(),
        }
    }

    /// Shared view of the request log, valid after the tracee is consumed.
    pub fn log(&self) -> Rc<RefCell<Vec<Request>>> {
        Rc::clone(&self.log)
    }
}

impl RemoteMemory for ScriptedTracee {
    fn read_word(&self, address: u64) -> std::io::Result<[u8; WORD_SIZE]> {
        self.memory.read_word(address)
    }
}

impl Tracee for ScriptedTracee {
    fn pid(&self) -> i32 {
        4242
    }

    fn state(&self) -> ProcessState {
        self.state
    }

    fn resume_to_syscall(&mut self, signal: Option<Signal>) -> Result<()> {
        self.log.borrow_mut().push(Request::Resume(signal));
        self.state = ProcessState::Running;
        Ok(())
    }

    fn wait_stop(&mut self) -> Result<StopEvent> {
        let step = self.steps.pop_front().ok_or_else(|| FilterscopeError::Ptrace {
            operation: "waitpid",
            pid: 4242,
            source: std::io::Error::from_raw_os_error(libc::ECHILD),
        })?;
        self.current = Some(step);
        Ok(match step {
            Step::Syscall(_) | Step::UnreadableSyscall => {
                self.state = ProcessState::StoppedAtSyscall;
                StopEvent::SyscallStop
            }
            Step::Signal(sig) => {
                self.state = ProcessState::StoppedAtSyscall;
                StopEvent::OtherStop(Some(sig))
            }
            Step::Exit(code) => {
                self.state = ProcessState::Exited;
                StopEvent::NormalExit(code)
            }
            Step::Killed(sig) => {
                self.state = ProcessState::SignalTerminated;
                StopEvent::SignalExit(sig)
            }
        })
    }

    fn syscall_event(&self) -> Result<SyscallEvent> {
        match self.current {
            Some(Step::Syscall(event)) => Ok(event),
            _ => Err(FilterscopeError::Ptrace {
                operation: "PTRACE_GETREGS",
                pid: 4242,
                source: std::io::Error::from_raw_os_error(libc::ESRCH),
            }),
        }
    }

    fn kill_and_reap(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Request::Kill);
        self.state = ProcessState::SignalTerminated;
        Ok(())
    }

    fn detach(&mut self) -> Result<()> {
        self.log.borrow_mut().push(Request::Detach);
        Ok(())
    }
}

/// A short allow-list filter in the shape libseccomp emits.
pub fn allowlist_program() -> Vec<SockFilter> {
    vec![
        SockFilter::new(0x20, 0, 0, 4),            // A = arch
        SockFilter::new(0x15, 0, 5, 0xc000_003e),  // x86_64?
        SockFilter::new(0x20, 0, 0, 0),            // A = nr
        SockFilter::new(0x35, 3, 0, 0x4000_0000),  // x32 range
        SockFilter::new(0x15, 0, 1, 1),            // write
        SockFilter::new(0x06, 0, 0, 0x7fff_0000),  // allow
        SockFilter::new(0x15, 0, 1, 60),           // exit
        SockFilter::new(0x06, 0, 0, 0x7fff_0000),  // allow
        SockFilter::new(0x06, 0, 0, 0x0005_0001),  // EPERM
        SockFilter::new(0x06, 0, 0, 0),            // kill
    ]
}
