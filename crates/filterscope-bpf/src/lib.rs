//! # filterscope-bpf
//!
//! Pure decoding of seccomp filter programs:
//! - **Records**: fixed-width field decoding of `sock_filter` and `sock_fprog`.
//! - **Disassembly**: a closed instruction set rendered as one text line each.
//! - **Syscall names**: number to name lookup for jump operands.
//!
//! Nothing here touches another process; bytes come in, text comes out.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod consts;
pub mod disasm;
pub mod insn;
pub mod program;
pub mod syscalls;
