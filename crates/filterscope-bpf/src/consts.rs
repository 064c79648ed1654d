//! Named bit patterns for classic BPF and seccomp.
//!
//! Values follow `linux/bpf_common.h`, `linux/filter.h` and
//! `linux/seccomp.h`. Only the patterns the disassembler recognizes are
//! listed; everything else falls through to an explicit unknown marker.

/// Instruction classes, selected by the low three opcode bits.
pub mod class {
    /// Mask selecting the class bits (`0b0000_0111`).
    pub const MASK: u16 = 0x07;
    /// `BPF_LD`: load into the accumulator.
    pub const LD: u16 = 0x00;
    /// `BPF_JMP`: conditional and unconditional jumps.
    pub const JMP: u16 = 0x05;
    /// `BPF_RET`: terminate with an action.
    pub const RET: u16 = 0x06;
}

/// Complete opcodes recognized by the disassembler.
pub mod opcode {
    /// `BPF_LD | BPF_W | BPF_ABS` (`0x00 | 0x00 | 0x20`): 32-bit absolute load.
    pub const LD_W_ABS: u16 = 0x20;
    /// `BPF_JMP | BPF_JA` (`0x05 | 0x00`): unconditional jump by `k`.
    pub const JMP_JA: u16 = 0x05;
    /// `BPF_JMP | BPF_JEQ | BPF_K` (`0x05 | 0x10 | 0x00`).
    pub const JMP_JEQ_K: u16 = 0x15;
    /// `BPF_JMP | BPF_JGT | BPF_K` (`0x05 | 0x20 | 0x00`).
    pub const JMP_JGT_K: u16 = 0x25;
    /// `BPF_JMP | BPF_JGE | BPF_K` (`0x05 | 0x30 | 0x00`).
    pub const JMP_JGE_K: u16 = 0x35;
}

/// Byte offsets into `struct seccomp_data`, the filter's input.
pub mod seccomp_data {
    /// `nr`: the syscall number (`u32` at offset 0).
    pub const NR: u32 = 0;
    /// `arch`: the `AUDIT_ARCH_*` token (`u32` at offset 4).
    pub const ARCH: u32 = 4;
}

/// Seccomp return actions.
pub mod ret {
    /// `SECCOMP_RET_KILL` (`0x0000_0000`): kill the calling thread.
    pub const KILL: u32 = 0x0000_0000;
    /// `SECCOMP_RET_TRAP` (`0x0003_0000`): deliver `SIGSYS`.
    pub const TRAP: u32 = 0x0003_0000;
    /// `SECCOMP_RET_ERRNO` (`0x0005_0000`): fail with the errno in the low bits.
    pub const ERRNO: u32 = 0x0005_0000;
    /// `SECCOMP_RET_ALLOW` (`0x7fff_0000`): run the syscall.
    pub const ALLOW: u32 = 0x7fff_0000;
    /// `SECCOMP_RET_ACTION_FULL` (`0xffff_0000`): action bits.
    pub const ACTION_MASK: u32 = 0xffff_0000;
    /// `SECCOMP_RET_DATA` (`0x0000_ffff`): action payload bits.
    pub const DATA_MASK: u32 = 0x0000_ffff;
}
