//! The raw `struct sock_filter` record.

use serde::Serialize;

/// Size of one encoded instruction in bytes.
pub const INSTRUCTION_SIZE: usize = 8;

/// One classic-BPF instruction exactly as stored in the filter array.
///
/// Layout: `code: u16` at 0, `jt: u8` at 2, `jf: u8` at 3, `k: u32` at 4,
/// all in the supervised process's (native) byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SockFilter {
    /// Opcode.
    pub code: u16,
    /// Jump displacement taken when the condition holds.
    pub jt: u8,
    /// Jump displacement taken when the condition fails.
    pub jf: u8,
    /// Immediate operand.
    pub k: u32,
}

impl SockFilter {
    /// Creates an instruction from its fields.
    #[must_use]
    pub const fn new(code: u16, jt: u8, jf: u8, k: u32) -> Self {
        Self { code, jt, jf, k }
    }

    /// Decodes an instruction from its 8-byte encoding.
    #[must_use]
    pub const fn decode(bytes: &[u8; INSTRUCTION_SIZE]) -> Self {
        Self {
            code: u16::from_ne_bytes([bytes[0], bytes[1]]),
            jt: bytes[2],
            jf: bytes[3],
            k: u32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    /// Decodes an instruction from a slice, or `None` if it is not exactly
    /// [`INSTRUCTION_SIZE`] bytes long.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <&[u8; INSTRUCTION_SIZE]>::try_from(bytes).ok().map(Self::decode)
    }

    /// Encodes the instruction back to its in-memory representation.
    #[must_use]
    pub fn encode(&self) -> [u8; INSTRUCTION_SIZE] {
        let mut out = [0u8; INSTRUCTION_SIZE];
        out[0..2].copy_from_slice(&self.code.to_ne_bytes());
        out[2] = self.jt;
        out[3] = self.jf;
        out[4..8].copy_from_slice(&self.k.to_ne_bytes());
        out
    }
}
