//! The `struct sock_fprog` header that points at a filter array.

use filterscope_common::constants::POINTER_SIZE;

use crate::insn::INSTRUCTION_SIZE;

/// Offset of the `filter` pointer: `len: u16` padded to pointer alignment.
pub const FILTER_POINTER_OFFSET: usize = POINTER_SIZE;

/// Size of the encoded header in bytes.
pub const HEADER_SIZE: usize = FILTER_POINTER_OFFSET + POINTER_SIZE;

/// Decoded `sock_fprog`: how many instructions, and where they live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Number of instructions in the filter array.
    pub len: u16,
    /// Remote address of the first instruction.
    pub filter: u64,
}

impl ProgramHeader {
    /// Decodes a header from exactly [`HEADER_SIZE`] bytes.
    ///
    /// Returns `None` for any other length; a partially read header is
    /// never decoded.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != HEADER_SIZE {
            return None;
        }
        let len = u16::from_ne_bytes([bytes[0], bytes[1]]);
        let filter = decode_pointer(&bytes[FILTER_POINTER_OFFSET..HEADER_SIZE])?;
        Some(Self { len, filter })
    }

    /// Encodes the header in the supervised process's layout, zeroing the
    /// padding. Returns `None` if `filter` does not fit a native pointer.
    #[must_use]
    pub fn encode(&self) -> Option<Vec<u8>> {
        let filter = usize::try_from(self.filter).ok()?;
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..2].copy_from_slice(&self.len.to_ne_bytes());
        bytes[FILTER_POINTER_OFFSET..].copy_from_slice(&filter.to_ne_bytes());
        Some(bytes)
    }

    /// Remote address of instruction `index`, or `None` on address overflow.
    #[must_use]
    pub fn instruction_address(&self, index: u16) -> Option<u64> {
        let offset = u64::from(index).checked_mul(INSTRUCTION_SIZE as u64)?;
        self.filter.checked_add(offset)
    }
}

fn decode_pointer(bytes: &[u8]) -> Option<u64> {
    match bytes.len() {
        8 => <[u8; 8]>::try_from(bytes).ok().map(u64::from_ne_bytes),
        4 => <[u8; 4]>::try_from(bytes)
            .ok()
            .map(|b| u64::from(u32::from_ne_bytes(b))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(len: u16, filter: u64) -> Vec<u8> {
        ProgramHeader { len, filter }.encode().unwrap()
    }

    #[test]
    fn decode_reads_len_and_pointer() {
        let header = ProgramHeader::decode(&encode(12, 0x7fff_1000)).unwrap();
        assert_eq!(header.len, 12);
        assert_eq!(header.filter, 0x7fff_1000);
    }

    #[test]
    fn decode_ignores_padding() {
        let mut bytes = encode(3, 0x4000);
        bytes[2..FILTER_POINTER_OFFSET].fill(0xaa);
        assert_eq!(
            ProgramHeader::decode(&bytes),
            Some(ProgramHeader { len: 3, filter: 0x4000 })
        );
    }

    #[test]
    fn decode_rejects_partial_header() {
        let bytes = encode(3, 0x4000);
        assert!(ProgramHeader::decode(&bytes[..HEADER_SIZE - 1]).is_none());
    }

    #[test]
    fn instruction_address_steps_by_record_size() {
        let header = ProgramHeader { len: 4, filter: 0x1000 };
        assert_eq!(header.instruction_address(0), Some(0x1000));
        assert_eq!(header.instruction_address(3), Some(0x1018));
    }

    #[test]
    fn instruction_address_overflow_is_none() {
        let header = ProgramHeader { len: 4, filter: u64::MAX - 4 };
        assert_eq!(header.instruction_address(1), None);
    }
}
