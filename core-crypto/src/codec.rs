//! Chunked AES-256-GCM encoding and random-access decoding.
//!
//! Encoding is streaming: [`ContainerEncoder`] wraps a plaintext reader and
//! is itself a reader over the finished container, so it can be fed straight
//! into a blob store without buffering the whole file. Decoding goes through
//! [`ContainerReader`], which seeks to the chunks a range touches and
//! authenticates each one before releasing any of its bytes.

use crate::container::{ContainerHeader, HEADER_LEN, NONCE_LEN, TAG_LEN};
use crate::error::{CryptoError, Result};
use crate::key::VaultKey;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, OsRng};
use aes_gcm::Aes256Gcm;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use tracing::{debug, warn};

fn random_base_nonce() -> [u8; NONCE_LEN] {
    let generated = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(generated.as_slice());
    nonce
}

/// Encrypt one chunk in place and return `tag || ciphertext`.
fn seal_chunk(
    cipher: &Aes256Gcm,
    header: &ContainerHeader,
    aad: &[u8; HEADER_LEN],
    index: u32,
    mut plaintext: Vec<u8>,
) -> Result<Vec<u8>> {
    let nonce = header.chunk_nonce(index);
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce), aad, &mut plaintext)
        .map_err(|_| CryptoError::CorruptContainer(format!("failed to seal chunk {}", index)))?;

    let mut sealed = Vec::with_capacity(TAG_LEN + plaintext.len());
    sealed.extend_from_slice(tag.as_slice());
    sealed.extend_from_slice(&plaintext);
    Ok(sealed)
}

fn to_io_error(err: CryptoError) -> io::Error {
    match err {
        CryptoError::Io(inner) => inner,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

/// Recover a [`CryptoError`] that travelled through an `io::Error`, e.g. out
/// of an `io::copy` driven by [`ContainerEncoder`].
pub fn crypto_error_from_io(err: io::Error) -> CryptoError {
    if err
        .get_ref()
        .is_some_and(|inner| inner.is::<CryptoError>())
    {
        if let Some(inner) = err.into_inner() {
            if let Ok(crypto) = inner.downcast::<CryptoError>() {
                return *crypto;
            }
        }
        return CryptoError::CorruptContainer("unrecoverable encoder error".to_string());
    }
    CryptoError::Io(err)
}

/// Streaming encoder: reads plaintext from `source`, yields container bytes.
///
/// The plaintext length must be known up front because it is part of the
/// header, which is authenticated with every chunk. If `source` turns out
/// shorter or longer than declared, reading fails with
/// [`CryptoError::SourceChanged`] and the partial output must be discarded.
pub struct ContainerEncoder<R> {
    source: R,
    cipher: Aes256Gcm,
    header: ContainerHeader,
    header_bytes: [u8; HEADER_LEN],
    next_chunk: u32,
    pending: Vec<u8>,
    pending_pos: usize,
    done: bool,
}

impl<R: Read> ContainerEncoder<R> {
    pub fn new(source: R, plaintext_len: u64, key: &VaultKey, chunk_size: u32) -> Result<Self> {
        let header = ContainerHeader::new(chunk_size, plaintext_len, random_base_nonce())?;
        let header_bytes = header.to_bytes();

        debug!(
            plaintext_len,
            chunk_size,
            chunk_count = header.chunk_count,
            "Encoding container"
        );

        Ok(Self {
            source,
            cipher: key.cipher(),
            header,
            header_bytes,
            next_chunk: 0,
            pending: header_bytes.to_vec(),
            pending_pos: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Total bytes this encoder will produce.
    pub fn container_len(&self) -> u64 {
        self.header.container_len()
    }

    fn fill_next_chunk(&mut self) -> Result<()> {
        let index = self.next_chunk;
        let mut plaintext = vec![0u8; self.header.chunk_plaintext_len(index)];
        self.source.read_exact(&mut plaintext).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CryptoError::SourceChanged(format!(
                "source ended before chunk {} of {}",
                index + 1,
                self.header.chunk_count
            )),
            _ => CryptoError::Io(e),
        })?;

        self.pending = seal_chunk(&self.cipher, &self.header, &self.header_bytes, index, plaintext)?;
        self.pending_pos = 0;
        self.next_chunk += 1;
        Ok(())
    }

    fn check_source_exhausted(&mut self) -> Result<()> {
        let mut extra = [0u8; 1];
        loop {
            match self.source.read(&mut extra) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(CryptoError::SourceChanged(format!(
                        "source is longer than the declared {} bytes",
                        self.header.total_length
                    )))
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CryptoError::Io(e)),
            }
        }
    }
}

impl<R: Read> Read for ContainerEncoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.pending_pos < self.pending.len() {
                let available = &self.pending[self.pending_pos..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.pending_pos += n;
                return Ok(n);
            }

            if self.done {
                return Ok(0);
            }

            if self.next_chunk == self.header.chunk_count {
                self.check_source_exhausted().map_err(to_io_error)?;
                self.done = true;
                return Ok(0);
            }

            self.fill_next_chunk().map_err(to_io_error)?;
        }
    }
}

/// Encrypt an in-memory plaintext into a complete container.
pub fn encode(plaintext: &[u8], key: &VaultKey, chunk_size: u32) -> Result<Vec<u8>> {
    let mut encoder =
        ContainerEncoder::new(Cursor::new(plaintext), plaintext.len() as u64, key, chunk_size)?;
    let mut out = Vec::with_capacity(encoder.container_len() as usize);
    encoder
        .read_to_end(&mut out)
        .map_err(crypto_error_from_io)?;
    Ok(out)
}

/// Random-access reader over a stored container.
pub struct ContainerReader<S> {
    source: S,
    cipher: Aes256Gcm,
    header: ContainerHeader,
    header_bytes: [u8; HEADER_LEN],
}

impl<S: Read + Seek> ContainerReader<S> {
    /// Parse the header and check the container has exactly the size the
    /// header implies. Truncated or padded containers are rejected here,
    /// before any chunk is touched.
    pub fn open(mut source: S, key: &VaultKey) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let (header, header_bytes) = ContainerHeader::read_from(&mut source)?;

        let actual_len = source.seek(SeekFrom::End(0))?;
        let expected_len = header.container_len();
        if actual_len != expected_len {
            warn!(actual_len, expected_len, "Container size does not match header");
            return Err(CryptoError::CorruptContainer(format!(
                "container is {} bytes but header describes {}",
                actual_len, expected_len
            )));
        }

        Ok(Self {
            source,
            cipher: key.cipher(),
            header,
            header_bytes,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Plaintext length.
    pub fn len(&self) -> u64 {
        self.header.total_length
    }

    pub fn is_empty(&self) -> bool {
        self.header.total_length == 0
    }

    /// Read and authenticate a single chunk.
    pub fn decrypt_chunk(&mut self, index: u32) -> Result<Vec<u8>> {
        if index >= self.header.chunk_count {
            return Err(CryptoError::OutOfRange {
                offset: self.header.chunk_start(index),
                length: 0,
                total: self.header.total_length,
            });
        }

        self.source
            .seek(SeekFrom::Start(self.header.chunk_offset(index)))?;

        let mut tag = [0u8; TAG_LEN];
        let mut buffer = vec![0u8; self.header.chunk_plaintext_len(index)];
        let truncated = |e: io::Error| match e.kind() {
            io::ErrorKind::UnexpectedEof => {
                CryptoError::CorruptContainer(format!("chunk {} is truncated", index))
            }
            _ => CryptoError::Io(e),
        };
        self.source.read_exact(&mut tag).map_err(truncated)?;
        self.source.read_exact(&mut buffer).map_err(truncated)?;

        let nonce = self.header.chunk_nonce(index);
        self.cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(&nonce),
                &self.header_bytes,
                &mut buffer,
                GenericArray::from_slice(&tag),
            )
            .map_err(|_| CryptoError::AuthenticationFailure { chunk: index })?;

        Ok(buffer)
    }

    /// Decrypt exactly `[offset, offset + length)`. Either every touched
    /// chunk authenticates and the full range is returned, or nothing is.
    pub fn read_range(&mut self, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.header.check_range(offset, length)?;
        let Some(chunks) = self.header.chunks_for_range(offset, length) else {
            return Ok(Vec::new());
        };

        let end = offset + length;
        let mut out = Vec::with_capacity(length as usize);
        for index in chunks {
            let plaintext = self.decrypt_chunk(index)?;
            out.extend_from_slice(&plaintext[self.header.chunk_slice(index, offset, end)]);
        }
        Ok(out)
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}

/// One-shot range decode over any seekable container source.
pub fn decode_range<S: Read + Seek>(
    source: S,
    key: &VaultKey,
    offset: u64,
    length: u64,
) -> Result<Vec<u8>> {
    ContainerReader::open(source, key)?.read_range(offset, length)
}
