//! Fixed-capacity, append-only output buffer.

use alloc::vec::Vec;
use core::fmt;

use crate::error::EncodeError;

/// Append-only byte buffer with a capacity fixed at creation.
///
/// All multi-byte writes are little-endian. A write that does not fit
/// fails with [`EncodeError::BufferFull`] and leaves the buffer unchanged.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "BufferParts"))]
pub struct CodeBuffer {
    data: Vec<u8>,
    capacity: usize,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct BufferParts {
    data: Vec<u8>,
    capacity: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<BufferParts> for CodeBuffer {
    type Error = EncodeError;

    fn try_from(p: BufferParts) -> Result<Self, Self::Error> {
        if p.data.len() > p.capacity {
            return Err(EncodeError::BufferFull {
                needed: p.data.len(),
                remaining: p.capacity,
            });
        }
        Ok(Self {
            data: p.data,
            capacity: p.capacity,
        })
    }
}

impl CodeBuffer {
    /// Default capacity: one page.
    pub const DEFAULT_CAPACITY: usize = 4096;

    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Current write cursor (bytes written so far).
    #[inline]
    pub fn position(&self) -> usize {
        self.data.len()
    }

    /// Bytes still available.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.data.len())
    }

    /// Fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Written bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer, returning the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn reserve(&self, needed: usize) -> Result<(), EncodeError> {
        if needed > self.remaining() {
            return Err(EncodeError::BufferFull {
                needed,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.reserve(bytes.len())?;
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Append one byte.
    pub fn write_u8(&mut self, v: u8) -> Result<(), EncodeError> {
        self.write_bytes(&[v])
    }

    /// Append two bytes, little-endian.
    pub fn write_u16(&mut self, v: u16) -> Result<(), EncodeError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Append four bytes, little-endian.
    pub fn write_u32(&mut self, v: u32) -> Result<(), EncodeError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Append eight bytes, little-endian.
    pub fn write_u64(&mut self, v: u64) -> Result<(), EncodeError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Pad with zero bytes up to the next multiple of `alignment`.
    ///
    /// An alignment of zero or one is a no-op.
    pub fn align_to(&mut self, alignment: usize) -> Result<(), EncodeError> {
        if alignment <= 1 {
            return Ok(());
        }
        let pad = (alignment - self.position() % alignment) % alignment;
        self.reserve(pad)?;
        self.data.resize(self.data.len() + pad, 0);
        Ok(())
    }
}

impl Default for CodeBuffer {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeBuffer")
            .field("position", &self.position())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Hex dump: 16 bytes per row with a 4-digit offset, bytes grouped by
/// four. Rows that are entirely zero are skipped.
impl fmt::Display for CodeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, chunk) in self.data.chunks(16).enumerate() {
            if chunk.iter().all(|&b| b == 0) {
                continue;
            }
            write!(f, "{:04x}:", row * 16)?;
            for (i, b) in chunk.iter().enumerate() {
                if i % 4 == 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{:02x}", b)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
