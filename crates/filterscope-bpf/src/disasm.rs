//! Seccomp filter disassembler.
//!
//! Each raw instruction is parsed once into the closed [`Instruction`]
//! set and then rendered on its own. Rendering is pure: the same
//! instruction at the same index always yields the same text.

use std::fmt;

use serde::Serialize;

use crate::consts::{class, opcode, ret, seccomp_data};
use crate::insn::SockFilter;
use crate::syscalls::syscall_name;

/// A parsed filter instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `BPF_LD` class.
    Load(Load),
    /// `BPF_JMP` class.
    Jump(Jump),
    /// `BPF_RET` class, carrying the seccomp action.
    Return(Action),
    /// Any class the disassembler does not handle.
    Unknown,
}

/// Load-class instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    /// `A = seccomp_data.nr`.
    SyscallNumber,
    /// `A = seccomp_data.arch`.
    Arch,
    /// 32-bit absolute load from any other input offset.
    Offset(u32),
    /// Any other load opcode.
    Unrecognized,
}

/// Jump-class instructions.
///
/// Conditional jumps branch to `jf` when the comparison fails; `jt` is
/// never consulted because the rendered line reads "if not, goto".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    /// `A == k`, operand is a syscall number.
    Eq {
        /// Compared operand.
        k: u32,
        /// Displacement when `A != k`.
        jf: u8,
    },
    /// `A > k`.
    Gt {
        /// Compared operand.
        k: u32,
        /// Displacement when `A <= k`.
        jf: u8,
    },
    /// `A >= k`.
    Ge {
        /// Compared operand.
        k: u32,
        /// Displacement when `A < k`.
        jf: u8,
    },
    /// Unconditional jump forward by `k`.
    Always {
        /// Displacement.
        k: u32,
    },
    /// Any other jump opcode.
    Unrecognized,
}

/// Seccomp return action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `SECCOMP_RET_KILL`.
    Kill,
    /// `SECCOMP_RET_ALLOW`.
    Allow,
    /// `SECCOMP_RET_TRAP`.
    Trap,
    /// `SECCOMP_RET_ERRNO` with its errno payload.
    Errno(u16),
    /// Anything else, kept verbatim.
    Raw(u32),
}

impl Action {
    /// Classifies a return operand.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_k(k: u32) -> Self {
        if k == ret::KILL {
            Self::Kill
        } else if k == ret::ALLOW {
            Self::Allow
        } else if k & ret::ACTION_MASK == ret::ERRNO {
            Self::Errno((k & ret::DATA_MASK) as u16)
        } else if k == ret::TRAP {
            Self::Trap
        } else {
            Self::Raw(k)
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kill => write!(f, "KILL"),
            Self::Allow => write!(f, "ALLOW"),
            Self::Trap => write!(f, "TRAP"),
            Self::Errno(errno) => write!(f, "ERRNO({errno})"),
            Self::Raw(k) => write!(f, "0x{k:08x}"),
        }
    }
}

impl Instruction {
    /// Parses a raw instruction by its class bits.
    #[must_use]
    pub const fn parse(raw: &SockFilter) -> Self {
        match raw.code & class::MASK {
            class::LD => Self::Load(parse_load(raw)),
            class::JMP => Self::Jump(parse_jump(raw)),
            class::RET => Self::Return(Action::from_k(raw.k)),
            _ => Self::Unknown,
        }
    }

    /// Renders the instruction as it would execute at position `index`.
    ///
    /// Jump targets are absolute line numbers and are not checked against
    /// the program length.
    #[must_use]
    pub fn render(&self, index: usize) -> String {
        match *self {
            Self::Load(Load::SyscallNumber) => "A = sys_number".to_owned(),
            Self::Load(Load::Arch) => "A = arch".to_owned(),
            Self::Load(Load::Offset(k)) => format!("A = data[{k}]"),
            Self::Load(Load::Unrecognized) => "A = ?".to_owned(),
            Self::Jump(Jump::Eq { k, jf }) => format!(
                "if (A != {}) goto {:04}",
                syscall_name(k),
                target(index, u32::from(jf))
            ),
            Self::Jump(Jump::Gt { k, jf }) => {
                format!("if (A > {k}) goto {:04}", target(index, u32::from(jf)))
            }
            Self::Jump(Jump::Ge { k, jf }) => {
                format!("if (A >= {k}) goto {:04}", target(index, u32::from(jf)))
            }
            Self::Jump(Jump::Always { k }) => format!("goto {:04}", target(index, k)),
            Self::Jump(Jump::Unrecognized) => "jmp?".to_owned(),
            Self::Return(action) => format!("return {action}"),
            Self::Unknown => "unknown".to_owned(),
        }
    }
}

const fn parse_load(raw: &SockFilter) -> Load {
    if raw.code != opcode::LD_W_ABS {
        return Load::Unrecognized;
    }
    match raw.k {
        seccomp_data::NR => Load::SyscallNumber,
        seccomp_data::ARCH => Load::Arch,
        k => Load::Offset(k),
    }
}

const fn parse_jump(raw: &SockFilter) -> Jump {
    let (k, jf) = (raw.k, raw.jf);
    match raw.code {
        opcode::JMP_JEQ_K => Jump::Eq { k, jf },
        opcode::JMP_JGT_K => Jump::Gt { k, jf },
        opcode::JMP_JGE_K => Jump::Ge { k, jf },
        opcode::JMP_JA => Jump::Always { k },
        _ => Jump::Unrecognized,
    }
}

fn target(index: usize, displacement: u32) -> u64 {
    index as u64 + u64::from(displacement) + 1
}

/// One rendered line of a filter listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedLine {
    /// Position of the instruction in the filter array.
    #[serde(rename = "line")]
    pub index: usize,
    /// The instruction as read.
    #[serde(flatten)]
    pub raw: SockFilter,
    /// Semantic rendering.
    pub text: String,
}

impl DecodedLine {
    /// Disassembles `raw` at position `index`.
    #[must_use]
    pub fn new(index: usize, raw: SockFilter) -> Self {
        let text = Instruction::parse(&raw).render(index);
        Self { index, raw, text }
    }
}

impl fmt::Display for DecodedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " {:04}: 0x{:02x} 0x{:02x} 0x{:02x} 0x{:08x}  {}",
            self.index, self.raw.code, self.raw.jt, self.raw.jf, self.raw.k, self.text
        )
    }
}

/// Disassembles a whole program in index order.
#[must_use]
pub fn disassemble(program: &[SockFilter]) -> Vec<DecodedLine> {
    let lines: Vec<DecodedLine> = program
        .iter()
        .enumerate()
        .map(|(index, raw)| DecodedLine::new(index, *raw))
        .collect();
    tracing::trace!(count = lines.len(), "disassembled filter");
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(code: u16, jt: u8, jf: u8, k: u32, index: usize) -> String {
        Instruction::parse(&SockFilter::new(code, jt, jf, k)).render(index)
    }

    #[test]
    fn load_sentinels() {
        assert_eq!(text(0x20, 0, 0, 0, 0), "A = sys_number");
        assert_eq!(text(0x20, 0, 0, 4, 0), "A = arch");
        assert_eq!(text(0x20, 0, 0, 16, 0), "A = data[16]");
    }

    #[test]
    fn other_load_opcode_is_marked_unknown() {
        // BPF_LD | BPF_H | BPF_ABS
        assert_eq!(text(0x28, 0, 0, 0, 0), "A = ?");
        // BPF_LD | BPF_IMM
        assert_eq!(text(0x00, 0, 0, 4, 0), "A = ?");
    }

    #[test]
    fn equality_jump_names_syscall_and_targets_false_branch() {
        assert_eq!(text(0x15, 0, 1, 59, 3), "if (A != execve) goto 0005");
        assert_eq!(text(0x15, 9, 0, 0, 7), "if (A != read) goto 0008");
    }

    #[test]
    fn equality_jump_unknown_syscall_is_hex() {
        assert_eq!(text(0x15, 0, 2, 0xc000_003e, 1), "if (A != 0xc000003e) goto 0004");
    }

    #[test]
    fn comparison_jumps_print_operand_decimal() {
        assert_eq!(text(0x25, 0, 4, 0x4000_0000, 2), "if (A > 1073741824) goto 0007");
        assert_eq!(text(0x35, 0, 0, 400, 10), "if (A >= 400) goto 0011");
    }

    #[test]
    fn unconditional_jump_uses_operand_not_displacements() {
        assert_eq!(text(0x05, 9, 9, 3, 2), "goto 0006");
    }

    #[test]
    fn jump_target_is_not_bounds_checked() {
        assert_eq!(text(0x15, 0, 255, 0, 9998), "if (A != read) goto 10254");
        assert_eq!(text(0x05, 0, 0, u32::MAX, 0), format!("goto {}", u64::from(u32::MAX) + 1));
    }

    #[test]
    fn unrecognized_jump_opcode() {
        // BPF_JMP | BPF_JSET | BPF_K
        assert_eq!(text(0x45, 0, 0, 1, 0), "jmp?");
        // BPF_JMP | BPF_JEQ | BPF_X
        assert_eq!(text(0x1d, 0, 0, 1, 0), "jmp?");
    }

    #[test]
    fn return_kill() {
        assert_eq!(text(0x06, 0, 0, 0, 0), "return KILL");
    }

    #[test]
    fn return_kill_ignores_jump_fields() {
        assert_eq!(text(0x06, 0xff, 0x11, 0, 42), "return KILL");
    }

    #[test]
    fn return_allow_and_trap() {
        assert_eq!(text(0x06, 0, 0, 0x7fff_0000, 0), "return ALLOW");
        assert_eq!(text(0x06, 0, 0, 0x0003_0000, 0), "return TRAP");
    }

    #[test]
    fn return_errno_uses_low_sixteen_bits() {
        for errno in [0u32, 1, 13, 38, 0xffff] {
            assert_eq!(
                text(0x06, 0, 0, ret::ERRNO | errno, 0),
                format!("return ERRNO({errno})")
            );
        }
    }

    #[test]
    fn return_other_action_is_raw_hex() {
        assert_eq!(text(0x06, 0, 0, 0x7ff0_0000, 0), "return 0x7ff00000");
        assert_eq!(text(0x06, 0, 0, 0x8000_0000, 0), "return 0x80000000");
    }

    #[test]
    fn unhandled_class_is_unknown() {
        // BPF_ALU | BPF_AND | BPF_K
        assert_eq!(text(0x54, 0, 0, 0xff, 0), "unknown");
        // BPF_MISC | BPF_TAX
        assert_eq!(text(0x07, 0, 0, 0, 0), "unknown");
    }

    #[test]
    fn rendering_is_idempotent() {
        let raw = SockFilter::new(0x15, 0, 3, 0x4_0000);
        let insn = Instruction::parse(&raw);
        let first = insn.render(12);
        for _ in 0..3 {
            assert_eq!(Instruction::parse(&raw).render(12), first);
            assert_eq!(DecodedLine::new(12, raw), DecodedLine::new(12, raw));
        }
    }

    #[test]
    fn decoded_line_echoes_raw_fields() {
        let line = DecodedLine::new(1, SockFilter::new(0x15, 0, 1, 317));
        assert_eq!(
            line.to_string(),
            " 0001: 0x15 0x00 0x01 0x0000013d  if (A != seccomp) goto 0003"
        );
    }

    #[test]
    fn decoded_line_serializes_flat() {
        let line = DecodedLine::new(0, SockFilter::new(0x06, 0, 0, 0));
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["line"], 0);
        assert_eq!(json["code"], 6);
        assert_eq!(json["k"], 0);
        assert_eq!(json["text"], "return KILL");
    }

    #[test]
    fn disassemble_preserves_order() {
        let program = [
            SockFilter::new(0x20, 0, 0, 0),
            SockFilter::new(0x06, 0, 0, 0x7fff_0000),
        ];
        let lines = disassemble(&program);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].index, 0);
        assert_eq!(lines[1].text, "return ALLOW");
    }
}
