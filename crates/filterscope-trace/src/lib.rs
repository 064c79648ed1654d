//! # filterscope-trace
//!
//! Supervises a child process with `ptrace(2)` until it installs a
//! seccomp filter, then captures that filter from its memory.
//!
//! - **Memory**: word-at-a-time reads from the child's address space.
//! - **Tracee**: the process-control surface the engine drives.
//! - **Dump**: materializes a `sock_fprog` and its instructions.
//! - **Interceptor**: the stop/resume loop that recognizes the install call.
//!
//! The ptrace-backed types only exist on Linux; everything else is
//! platform-neutral and is exercised in tests against in-memory fakes.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod dump;
pub mod interceptor;
pub mod memory;
pub mod signature;
pub mod tracee;
