//! Container header and chunk layout arithmetic.
//!
//! Everything here is pure: offsets, lengths and nonces are computed from the
//! header alone, which is what lets a reader jump straight to the chunk that
//! holds a given plaintext byte.

use crate::error::{CryptoError, Result};
use std::io::{self, Read, Write};
use std::ops::{Range, RangeInclusive};

pub const FORMAT_VERSION: u16 = 1;
pub const HEADER_LEN: usize = 30;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

pub const DEFAULT_CHUNK_SIZE: u32 = 256 * 1024;
pub const MAX_CHUNK_SIZE: u32 = 64 * 1024 * 1024;

/// Reject chunk sizes the format cannot hold.
pub fn validate_chunk_size(chunk_size: u32) -> Result<()> {
    if chunk_size == 0 || chunk_size > MAX_CHUNK_SIZE {
        return Err(CryptoError::InvalidChunkSize(chunk_size));
    }
    Ok(())
}

/// Number of chunks needed for `total_length` plaintext bytes.
pub fn chunk_count_for(total_length: u64, chunk_size: u32) -> u64 {
    total_length.div_ceil(u64::from(chunk_size))
}

/// Per-chunk nonce: the chunk index, little-endian, XORed into the last
/// eight bytes of the base nonce. Injective in `index`.
pub fn derive_nonce(base_nonce: &[u8; NONCE_LEN], index: u32) -> [u8; NONCE_LEN] {
    let mut nonce = *base_nonce;
    let counter = u64::from(index).to_le_bytes();
    for (byte, c) in nonce[4..].iter_mut().zip(counter) {
        *byte ^= c;
    }
    nonce
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub format_version: u16,
    pub chunk_size: u32,
    /// Plaintext length in bytes
    pub total_length: u64,
    pub chunk_count: u32,
    pub base_nonce: [u8; NONCE_LEN],
}

impl ContainerHeader {
    /// Header for a new container.
    pub fn new(chunk_size: u32, total_length: u64, base_nonce: [u8; NONCE_LEN]) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        let chunk_count = u32::try_from(chunk_count_for(total_length, chunk_size))
            .map_err(|_| CryptoError::PlaintextTooLarge(total_length))?;

        Ok(Self {
            format_version: FORMAT_VERSION,
            chunk_size,
            total_length,
            chunk_count,
            base_nonce,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..2].copy_from_slice(&self.format_version.to_le_bytes());
        out[2..6].copy_from_slice(&self.chunk_size.to_le_bytes());
        out[6..14].copy_from_slice(&self.total_length.to_le_bytes());
        out[14..18].copy_from_slice(&self.chunk_count.to_le_bytes());
        out[18..30].copy_from_slice(&self.base_nonce);
        out
    }

    /// Parse and validate a header.
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self> {
        let format_version = u16::from_le_bytes([bytes[0], bytes[1]]);
        if format_version != FORMAT_VERSION {
            return Err(CryptoError::CorruptContainer(format!(
                "unsupported format version {}",
                format_version
            )));
        }

        let chunk_size = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        validate_chunk_size(chunk_size).map_err(|_| {
            CryptoError::CorruptContainer(format!("invalid chunk size {}", chunk_size))
        })?;

        let mut total = [0u8; 8];
        total.copy_from_slice(&bytes[6..14]);
        let total_length = u64::from_le_bytes(total);

        let chunk_count = u32::from_le_bytes([bytes[14], bytes[15], bytes[16], bytes[17]]);
        let expected = chunk_count_for(total_length, chunk_size);
        if u64::from(chunk_count) != expected {
            return Err(CryptoError::CorruptContainer(format!(
                "chunk count {} inconsistent with length {} at chunk size {}",
                chunk_count, total_length, chunk_size
            )));
        }

        let mut base_nonce = [0u8; NONCE_LEN];
        base_nonce.copy_from_slice(&bytes[18..30]);

        Ok(Self {
            format_version,
            chunk_size,
            total_length,
            chunk_count,
            base_nonce,
        })
    }

    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Read and validate a header. A short read is `CorruptContainer`.
    pub fn read_from(mut r: impl Read) -> Result<(Self, [u8; HEADER_LEN])> {
        let mut bytes = [0u8; HEADER_LEN];
        r.read_exact(&mut bytes).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                CryptoError::CorruptContainer("truncated header".to_string())
            }
            _ => CryptoError::Io(e),
        })?;
        Ok((Self::parse(&bytes)?, bytes))
    }

    /// Plaintext length of chunk `index`; only the final chunk may be short.
    pub fn chunk_plaintext_len(&self, index: u32) -> usize {
        debug_assert!(index < self.chunk_count);
        let start = u64::from(index) * u64::from(self.chunk_size);
        (self.total_length - start).min(u64::from(self.chunk_size)) as usize
    }

    /// Byte offset of chunk `index` (its tag) within the container.
    pub fn chunk_offset(&self, index: u32) -> u64 {
        HEADER_LEN as u64 + u64::from(index) * (u64::from(self.chunk_size) + TAG_LEN as u64)
    }

    /// Exact byte length of a well-formed container with this header.
    pub fn container_len(&self) -> u64 {
        HEADER_LEN as u64 + u64::from(self.chunk_count) * TAG_LEN as u64 + self.total_length
    }

    /// Plaintext offset where chunk `index` starts.
    pub fn chunk_start(&self, index: u32) -> u64 {
        u64::from(index) * u64::from(self.chunk_size)
    }

    /// Chunk holding plaintext byte `offset`.
    pub fn chunk_index_of(&self, offset: u64) -> u32 {
        (offset / u64::from(self.chunk_size)) as u32
    }

    /// Validate `[offset, offset + length)` against the plaintext length.
    pub fn check_range(&self, offset: u64, length: u64) -> Result<()> {
        match offset.checked_add(length) {
            Some(end) if end <= self.total_length => Ok(()),
            _ => Err(CryptoError::OutOfRange {
                offset,
                length,
                total: self.total_length,
            }),
        }
    }

    /// Inclusive chunk indices overlapping `[offset, offset + length)`;
    /// `None` for an empty range. The range must already be checked.
    pub fn chunks_for_range(&self, offset: u64, length: u64) -> Option<RangeInclusive<u32>> {
        if length == 0 {
            return None;
        }
        let first = self.chunk_index_of(offset);
        let last = self.chunk_index_of(offset + length - 1);
        Some(first..=last)
    }

    /// Byte range within chunk `index`'s plaintext that falls inside
    /// `[offset, end)`. The chunk must overlap that range.
    pub fn chunk_slice(&self, index: u32, offset: u64, end: u64) -> Range<usize> {
        let chunk_start = self.chunk_start(index);
        let from = offset.saturating_sub(chunk_start) as usize;
        let to = (end - chunk_start).min(self.chunk_plaintext_len(index) as u64) as usize;
        from..to
    }

    pub fn chunk_nonce(&self, index: u32) -> [u8; NONCE_LEN] {
        derive_nonce(&self.base_nonce, index)
    }
}
