//! The two call shapes that install a seccomp filter.
//!
//! Syscall numbers are for the x86_64 64-bit ABI, matching the
//! register layout the tracee reads.

use std::fmt;

use filterscope_common::types::SyscallEvent;
use serde::Serialize;

/// `__NR_prctl` (157, `0x9d`).
pub const SYS_PRCTL: u64 = 157;

/// `__NR_seccomp` (317, `0x13d`).
pub const SYS_SECCOMP: u64 = 317;

/// `PR_SET_SECCOMP` (22, `0x16`): `prctl` option selecting the seccomp mode.
pub const PR_SET_SECCOMP: u64 = 22;

/// `SECCOMP_MODE_FILTER` (2): filter mode, as opposed to strict mode (1).
pub const SECCOMP_MODE_FILTER: u64 = 2;

/// Which of the recognized calls installed the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallCall {
    /// `seccomp(op, flags, prog)`.
    Seccomp,
    /// `prctl(PR_SET_SECCOMP, SECCOMP_MODE_FILTER, prog)`.
    PrctlSetSeccomp,
}

impl fmt::Display for InstallCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seccomp => write!(f, "seccomp()"),
            Self::PrctlSetSeccomp => write!(f, "prctl(PR_SET_SECCOMP)"),
        }
    }
}

/// Shape of one filter-install call.
#[derive(Debug, Clone, Copy)]
pub struct CallSignature {
    /// Call this signature identifies.
    pub call: InstallCall,
    /// Syscall number.
    pub number: u64,
    /// `(argument index, required value)` pairs that must all hold.
    pub selectors: &'static [(usize, u64)],
    /// Argument index holding the `struct sock_fprog *`.
    pub program_arg: usize,
}

/// Recognized signatures, tried in order.
///
/// `seccomp(2)` matches whatever its operation argument says. For
/// `prctl(2)` the program pointer is the argument after the two selectors.
pub const SIGNATURES: &[CallSignature] = &[
    CallSignature {
        call: InstallCall::Seccomp,
        number: SYS_SECCOMP,
        selectors: &[],
        program_arg: 2,
    },
    CallSignature {
        call: InstallCall::PrctlSetSeccomp,
        number: SYS_PRCTL,
        selectors: &[(0, PR_SET_SECCOMP), (1, SECCOMP_MODE_FILTER)],
        program_arg: 2,
    },
];

/// A recognized filter-install call and the pointer it passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterInstall {
    /// Which call was made.
    pub call: InstallCall,
    /// Remote address of the `struct sock_fprog`.
    pub program: u64,
}

impl CallSignature {
    /// Returns the install described by `event` if it has this shape.
    #[must_use]
    pub fn matches(&self, event: &SyscallEvent) -> Option<FilterInstall> {
        if event.number != self.number {
            return None;
        }
        let selected = self
            .selectors
            .iter()
            .all(|&(index, value)| event.arg(index) == Some(value));
        if !selected {
            return None;
        }
        Some(FilterInstall {
            call: self.call,
            program: event.arg(self.program_arg)?,
        })
    }
}

/// Tests `event` against every signature in [`SIGNATURES`].
#[must_use]
pub fn recognize(event: &SyscallEvent) -> Option<FilterInstall> {
    SIGNATURES.iter().find_map(|signature| signature.matches(event))
}
