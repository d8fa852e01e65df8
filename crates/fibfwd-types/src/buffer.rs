//! Bounds-checked packet buffer access.
//!
//! Header rewrites address the frame by byte offset. Every access goes through
//! [`PacketBuffer`], which checks `offset + len` against the buffer length and
//! reports overruns as [`BufferError`] instead of touching memory past the end.

use thiserror::Error;

/// Error returned by a load or store that does not fit in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("access of {len} bytes at offset {offset} exceeds buffer length {buffer_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },
}

/// Byte-region access to a packet owned by a single invocation.
pub trait PacketBuffer {
    /// Total number of addressable bytes.
    fn len(&self) -> usize;

    /// Returns true if the buffer holds no bytes.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    fn load_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError>;

    /// Overwrites `src.len()` bytes starting at `offset`.
    ///
    /// A failed store leaves the buffer unmodified.
    fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError>;
}

/// Resolves `offset..offset + len` against a buffer of `buffer_len` bytes.
fn checked_range(
    offset: usize,
    len: usize,
    buffer_len: usize,
) -> Result<std::ops::Range<usize>, BufferError> {
    let end = offset
        .checked_add(len)
        .filter(|end| *end <= buffer_len)
        .ok_or(BufferError::OutOfBounds {
            offset,
            len,
            buffer_len,
        })?;
    Ok(offset..end)
}

impl PacketBuffer for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn load_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        let range = checked_range(offset, dst.len(), <[u8]>::len(self))?;
        dst.copy_from_slice(&self[range]);
        Ok(())
    }

    fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError> {
        let range = checked_range(offset, src.len(), <[u8]>::len(self))?;
        self[range].copy_from_slice(src);
        Ok(())
    }
}

impl PacketBuffer for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn load_bytes(&self, offset: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        self.as_slice().load_bytes(offset, dst)
    }

    fn store_bytes(&mut self, offset: usize, src: &[u8]) -> Result<(), BufferError> {
        self.as_mut_slice().store_bytes(offset, src)
    }
}
