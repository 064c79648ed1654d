//! Reading byte ranges out of another process's address space.

use filterscope_common::error::{FilterscopeError, Result};

/// Size of one `PTRACE_PEEKDATA` transfer in bytes.
pub const WORD_SIZE: usize = std::mem::size_of::<libc::c_long>();

/// Word-granular access to a remote address space.
///
/// Implementors only provide [`read_word`](Self::read_word); range reads
/// are built on top of it.
pub trait RemoteMemory {
    /// Reads the machine word starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the word cannot be read (unmapped page,
    /// permission denied, process gone).
    fn read_word(&self, address: u64) -> std::io::Result<[u8; WORD_SIZE]>;

    /// Reads `length` bytes starting at `address`.
    ///
    /// The range is covered one word at a time; only the needed prefix of
    /// the final word is kept. The read is all-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`FilterscopeError::RemoteRead`] if any word read fails or
    /// the range wraps the address space. No partial data is returned.
    fn read_bytes(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(length);
        let mut offset = 0usize;
        while offset < length {
            let word_address = address.checked_add(offset as u64).ok_or_else(|| {
                FilterscopeError::RemoteRead {
                    address,
                    length,
                    word_address: address,
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "range wraps the address space",
                    ),
                }
            })?;
            let word = self
                .read_word(word_address)
                .map_err(|source| FilterscopeError::RemoteRead {
                    address,
                    length,
                    word_address,
                    source,
                })?;
            let take = (length - offset).min(WORD_SIZE);
            out.extend_from_slice(&word[..take]);
            offset += WORD_SIZE;
        }
        tracing::trace!(address, length, "remote read");
        Ok(out)
    }
}
