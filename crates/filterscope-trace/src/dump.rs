//! Pulling a filter program out of the supervised process.

use filterscope_bpf::disasm::{self, DecodedLine};
use filterscope_bpf::insn::{INSTRUCTION_SIZE, SockFilter};
use filterscope_bpf::program::{HEADER_SIZE, ProgramHeader};
use filterscope_common::error::{FilterscopeError, Result};

use crate::memory::RemoteMemory;

/// The instruction whose read stopped materialization.
#[derive(Debug)]
pub struct InstructionReadFailure {
    /// Index of the unreadable instruction.
    pub index: u16,
    /// Why it could not be read.
    pub error: FilterscopeError,
}

/// A filter program as far as it could be read.
#[derive(Debug)]
pub struct FilterProgram {
    /// The `sock_fprog` header.
    pub header: ProgramHeader,
    /// Instructions `0..n` read before the first failure (all of them on
    /// success).
    pub instructions: Vec<SockFilter>,
    /// Set when an instruction read failed before reaching `header.len`.
    pub failure: Option<InstructionReadFailure>,
}

impl FilterProgram {
    /// Returns `true` if every instruction the header announced was read.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Disassembles the instructions that were read, in index order.
    #[must_use]
    pub fn lines(&self) -> Vec<DecodedLine> {
        disasm::disassemble(&self.instructions)
    }
}

/// Reads the `sock_fprog` at `program` and then each of its instructions.
///
/// A failed instruction read ends the walk but keeps what came before it;
/// the failure is recorded on the returned program.
///
/// # Errors
///
/// Returns an error if the header itself cannot be read. No instructions
/// are read in that case.
pub fn materialize<M: RemoteMemory + ?Sized>(memory: &M, program: u64) -> Result<FilterProgram> {
    let bytes = memory.read_bytes(program, HEADER_SIZE)?;
    let header = ProgramHeader::decode(&bytes).ok_or_else(|| FilterscopeError::RemoteRead {
        address: program,
        length: HEADER_SIZE,
        word_address: program,
        source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short header"),
    })?;
    tracing::debug!(len = header.len, filter = header.filter, "read filter header");

    let mut instructions = Vec::with_capacity(usize::from(header.len));
    let mut failure = None;
    for index in 0..header.len {
        match read_instruction(memory, &header, index) {
            Ok(insn) => instructions.push(insn),
            Err(error) => {
                tracing::warn!(index, %error, "filter instruction unreadable");
                failure = Some(InstructionReadFailure { index, error });
                break;
            }
        }
    }

    Ok(FilterProgram {
        header,
        instructions,
        failure,
    })
}

fn read_instruction<M: RemoteMemory + ?Sized>(
    memory: &M,
    header: &ProgramHeader,
    index: u16,
) -> Result<SockFilter> {
    let address = header
        .instruction_address(index)
        .ok_or_else(|| FilterscopeError::RemoteRead {
            address: header.filter,
            length: INSTRUCTION_SIZE,
            word_address: header.filter,
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "instruction address overflows",
            ),
        })?;
    let bytes = memory.read_bytes(address, INSTRUCTION_SIZE)?;
    SockFilter::from_slice(&bytes).ok_or_else(|| FilterscopeError::RemoteRead {
        address,
        length: INSTRUCTION_SIZE,
        word_address: address,
        source: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short instruction"),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::memory::WORD_SIZE;

    /// Sparse word-addressed memory.
    #[derive(Default)]
    struct Words(HashMap<u64, [u8; WORD_SIZE]>);

    impl Words {
        fn store(&mut self, address: u64, bytes: &[u8]) {
            for (i, chunk) in bytes.chunks(WORD_SIZE).enumerate() {
                let mut word = [0u8; WORD_SIZE];
                word[..chunk.len()].copy_from_slice(chunk);
                let _ = self.0.insert(address + (i * WORD_SIZE) as u64, word);
            }
        }
    }

    impl RemoteMemory for Words {
        fn read_word(&self, address: u64) -> std::io::Result<[u8; WORD_SIZE]> {
            self.0
                .get(&address)
                .copied()
                .ok_or_else(|| std::io::Error::from_raw_os_error(libc::EIO))
        }
    }

    fn program(len: u16, filter: u64, insns: &[SockFilter]) -> Words {
        let mut mem = Words::default();
        mem.store(0x1000, &ProgramHeader { len, filter }.encode().unwrap());
        let bytes: Vec<u8> = insns.iter().flat_map(SockFilter::encode).collect();
        mem.store(filter, &bytes);
        mem
    }

    #[test]
    fn reads_every_instruction() {
        let insns = [
            SockFilter::new(0x20, 0, 0, 4),
            SockFilter::new(0x06, 0, 0, 0x7fff_0000),
        ];
        let prog = materialize(&program(2, 0x2000, &insns), 0x1000).unwrap();
        assert!(prog.is_complete());
        assert_eq!(prog.instructions, insns);
        assert_eq!(prog.header, ProgramHeader { len: 2, filter: 0x2000 });
    }

    #[test]
    fn empty_program_has_no_lines() {
        let prog = materialize(&program(0, 0x2000, &[]), 0x1000).unwrap();
        assert!(prog.is_complete());
        assert!(prog.lines().is_empty());
    }

    #[test]
    fn unreadable_header_yields_error() {
        let mem = Words::default();
        assert!(matches!(
            materialize(&mem, 0x1000),
            Err(FilterscopeError::RemoteRead { address: 0x1000, .. })
        ));
    }

    #[test]
    fn partial_program_keeps_prefix() {
        // Header claims three instructions; only two are mapped.
        let insns = [SockFilter::new(0x20, 0, 0, 0), SockFilter::new(0x06, 0, 0, 0)];
        let prog = materialize(&program(3, 0x2000, &insns), 0x1000).unwrap();
        assert!(!prog.is_complete());
        assert_eq!(prog.instructions.len(), 2);
        assert_eq!(prog.failure.as_ref().map(|f| f.index), Some(2));
        assert_eq!(prog.lines()[1].text, "return KILL");
    }
}
