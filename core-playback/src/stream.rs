//! # Encrypted Stream
//!
//! Random-access plaintext view over a stored container, handed to the media
//! player as its byte source. Only the chunks a read overlaps are decrypted;
//! recently used chunks are kept in a small LRU so the decoder's habit of
//! re-reading nearby bytes does not cost a decryption each time.
//!
//! ```text
//!  decoder thread                 EncryptedStream
//!  ──────────────                 ──────────────────────────────
//!  seek(n) / read(buf)  ───────►  position ─► chunk index
//!                                    │
//!                                    ├─ LRU hit  ─► plaintext
//!                                    └─ miss ─► ContainerReader::decrypt_chunk
//!                                                  (BlobReader: file on disk)
//! ```
//!
//! Plaintext is only ever held in memory.

use crate::error::{PlaybackError, Result};
use bridge_traits::storage::{BlobReader, BlobRef, BlobStore};
use core_crypto::{ContainerHeader, ContainerReader, VaultKey};
use lru::LruCache;
use parking_lot::Mutex;
use std::io::{self, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Counters for one open stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Chunks decrypted (cache misses).
    pub chunks_decrypted: u64,
    /// Chunk lookups served from the cache.
    pub cache_hits: u64,
    /// Plaintext bytes returned to callers.
    pub bytes_read: u64,
}

pub struct EncryptedStream {
    reader: Option<ContainerReader<Box<dyn BlobReader>>>,
    header: ContainerHeader,
    cache: Option<LruCache<u32, Arc<Vec<u8>>>>,
    position: u64,
    stats: StreamStats,
}

impl EncryptedStream {
    /// Open the container stored at `reference`.
    ///
    /// `cache_chunks` is the number of decrypted chunks kept in memory; `0`
    /// disables caching.
    #[instrument(skip(store, key), fields(reference = %reference))]
    pub fn open(
        store: &dyn BlobStore,
        reference: &BlobRef,
        key: &VaultKey,
        cache_chunks: usize,
    ) -> Result<Self> {
        let source = store.open(reference)?;
        Self::from_reader(source, key, cache_chunks)
    }

    /// Wrap an already opened container source.
    pub fn from_reader(
        source: Box<dyn BlobReader>,
        key: &VaultKey,
        cache_chunks: usize,
    ) -> Result<Self> {
        let reader = ContainerReader::open(source, key)?;
        let header = *reader.header();
        debug!(
            length = header.total_length,
            chunks = header.chunk_count,
            "Opened encrypted stream"
        );

        Ok(Self {
            reader: Some(reader),
            header,
            cache: NonZeroUsize::new(cache_chunks).map(LruCache::new),
            position: 0,
            stats: StreamStats::default(),
        })
    }

    /// Plaintext length, read from the header.
    pub fn length(&self) -> u64 {
        self.header.total_length
    }

    /// Current read position. May be past the end after a seek.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Read up to `max_len` plaintext bytes starting at `offset`.
    ///
    /// Returns fewer bytes only when the end of the media is reached, and an
    /// empty buffer at or past the end. A chunk that fails authentication
    /// fails the whole call. The stream position is not changed.
    pub fn read_at(&mut self, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        if self.reader.is_none() {
            return Err(PlaybackError::StreamClosed);
        }

        let total = self.header.total_length;
        if offset >= total || max_len == 0 {
            return Ok(Vec::new());
        }

        let length = (max_len as u64).min(total - offset);
        let end = offset + length;
        let Some(indices) = self.header.chunks_for_range(offset, length) else {
            return Ok(Vec::new());
        };

        // Every chunk must authenticate before any byte is copied out.
        let mut chunks = Vec::new();
        for index in indices {
            chunks.push((index, self.chunk(index)?));
        }

        let mut out = Vec::with_capacity(length as usize);
        for (index, plaintext) in chunks {
            out.extend_from_slice(&plaintext[self.header.chunk_slice(index, offset, end)]);
        }

        self.stats.bytes_read += out.len() as u64;
        Ok(out)
    }

    /// Drop cached plaintext and release the underlying blob handle.
    /// Further reads fail with [`PlaybackError::StreamClosed`].
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            if let Some(cache) = self.cache.as_mut() {
                cache.clear();
            }
            debug!(position = self.position, "Closed encrypted stream");
        }
    }

    fn chunk(&mut self, index: u32) -> Result<Arc<Vec<u8>>> {
        if let Some(plaintext) = self.cache.as_mut().and_then(|c| c.get(&index)) {
            self.stats.cache_hits += 1;
            return Ok(Arc::clone(plaintext));
        }

        let reader = self.reader.as_mut().ok_or(PlaybackError::StreamClosed)?;
        let plaintext = Arc::new(reader.decrypt_chunk(index)?);
        self.stats.chunks_decrypted += 1;

        if let Some(cache) = self.cache.as_mut() {
            cache.put(index, Arc::clone(&plaintext));
        }
        Ok(plaintext)
    }
}

impl std::fmt::Debug for EncryptedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStream")
            .field("length", &self.header.total_length)
            .field("position", &self.position)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn to_io_error(err: PlaybackError) -> io::Error {
    match err {
        PlaybackError::IoError(e) => e,
        PlaybackError::StreamClosed => io::Error::new(io::ErrorKind::BrokenPipe, err),
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl Read for EncryptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = self.read_at(self.position, buf.len()).map_err(to_io_error)?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        self.position += bytes.len() as u64;
        Ok(bytes.len())
    }
}

impl Seek for EncryptedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.header.total_length.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };

        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative or overflowing position",
            )),
        }
    }
}

/// Cloneable handle to a stream shared between the playback session and the
/// thread that drives the decoder.
#[derive(Clone, Debug)]
pub struct StreamHandle {
    inner: Arc<Mutex<EncryptedStream>>,
}

impl StreamHandle {
    pub fn new(stream: EncryptedStream) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    pub fn length(&self) -> u64 {
        self.inner.lock().length()
    }

    pub fn position(&self) -> u64 {
        self.inner.lock().position()
    }

    pub fn stats(&self) -> StreamStats {
        self.inner.lock().stats()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed()
    }

    pub fn read_at(&self, offset: u64, max_len: usize) -> Result<Vec<u8>> {
        self.inner.lock().read_at(offset, max_len)
    }

    /// Close the stream for every clone of this handle; returns the
    /// position it was closed at.
    pub fn close(&self) -> u64 {
        let mut stream = self.inner.lock();
        stream.close();
        stream.position()
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.lock().read(buf)
    }
}

impl Seek for StreamHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_crypto::{decode_range, encode};
    use std::io::Cursor;

    fn stream_over(plaintext: &[u8], chunk_size: u32, cache: usize) -> EncryptedStream {
        let key = VaultKey::generate();
        let container = encode(plaintext, &key, chunk_size).unwrap();
        EncryptedStream::from_reader(Box::new(Cursor::new(container)), &key, cache).unwrap()
    }

    #[test]
    fn test_length_comes_from_header() {
        let stream = stream_over(&[7u8; 1000], 64, 2);
        assert_eq!(stream.length(), 1000);
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.stats().chunks_decrypted, 0);
    }

    #[test]
    fn test_read_at_touches_only_overlapping_chunks() {
        let stream_data = b"ABCDEFGHIJ";
        let mut stream = stream_over(stream_data, 4, 0);

        assert_eq!(stream.read_at(3, 4).unwrap(), b"DEFG");
        assert_eq!(stream.stats().chunks_decrypted, 2);
    }

    #[test]
    fn test_read_at_agrees_with_decode_range() {
        let plaintext: Vec<u8> = (0..23u8).collect();
        let key = VaultKey::generate();
        let container = encode(&plaintext, &key, 5).unwrap();
        let mut stream =
            EncryptedStream::from_reader(Box::new(Cursor::new(container.clone())), &key, 3)
                .unwrap();

        for offset in 0..plaintext.len() as u64 {
            for length in 1..=(plaintext.len() as u64 - offset) {
                let expected =
                    decode_range(Cursor::new(&container), &key, offset, length).unwrap();
                assert_eq!(stream.read_at(offset, length as usize).unwrap(), expected);
            }
        }
    }

    #[test]
    fn test_short_read_only_at_end() {
        let mut stream = stream_over(b"ABCDEFGHIJ", 4, 0);

        assert_eq!(stream.read_at(8, 100).unwrap(), b"IJ");
        assert!(stream.read_at(10, 4).unwrap().is_empty());
        assert!(stream.read_at(500, 4).unwrap().is_empty());
    }

    #[test]
    fn test_cache_serves_repeated_reads() {
        let mut stream = stream_over(&[1u8; 256], 64, 2);

        stream.read_at(0, 10).unwrap();
        stream.read_at(20, 10).unwrap();
        assert_eq!(stream.stats().chunks_decrypted, 1);
        assert_eq!(stream.stats().cache_hits, 1);
    }

    #[test]
    fn test_cache_evicts_least_recently_used() {
        let mut stream = stream_over(&[1u8; 256], 64, 2);

        stream.read_at(0, 1).unwrap(); // chunk 0
        stream.read_at(64, 1).unwrap(); // chunk 1
        stream.read_at(128, 1).unwrap(); // chunk 2 evicts 0
        stream.read_at(0, 1).unwrap();
        assert_eq!(stream.stats().chunks_decrypted, 4);
    }

    #[test]
    fn test_zero_cache_decrypts_every_time() {
        let mut stream = stream_over(&[1u8; 128], 64, 0);

        stream.read_at(0, 1).unwrap();
        stream.read_at(1, 1).unwrap();
        assert_eq!(stream.stats().chunks_decrypted, 2);
        assert_eq!(stream.stats().cache_hits, 0);
    }

    #[test]
    fn test_read_and_seek() {
        let mut stream = stream_over(b"ABCDEFGHIJ", 4, 4);

        let mut buf = [0u8; 3];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ABC");
        assert_eq!(stream.position(), 3);

        stream.seek(SeekFrom::End(-2)).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"IJ");

        stream.seek(SeekFrom::Current(-5)).unwrap();
        assert_eq!(stream.position(), 5);
    }

    #[test]
    fn test_seek_past_end_reads_nothing() {
        let mut stream = stream_over(b"ABCDEFGHIJ", 4, 4);

        assert_eq!(stream.seek(SeekFrom::Start(50)).unwrap(), 50);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_negative_seek_is_rejected() {
        let mut stream = stream_over(b"ABCDEFGHIJ", 4, 4);

        let err = stream.seek(SeekFrom::Current(-1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_closed_stream_refuses_reads() {
        let mut stream = stream_over(b"ABCDEFGHIJ", 4, 4);
        stream.read_at(0, 4).unwrap();

        stream.close();
        assert!(stream.is_closed());
        assert!(matches!(
            stream.read_at(0, 4),
            Err(PlaybackError::StreamClosed)
        ));
        // Cached plaintext is gone too.
        assert!(stream.cache.as_ref().unwrap().is_empty());
    }

    #[test]
    fn test_handle_close_is_seen_by_clones() {
        let handle = StreamHandle::new(stream_over(b"ABCDEFGHIJ", 4, 4));
        let mut decoder_side = handle.clone();

        let mut buf = [0u8; 6];
        decoder_side.read_exact(&mut buf).unwrap();
        assert_eq!(handle.close(), 6);

        let err = decoder_side.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_empty_media() {
        let mut stream = stream_over(b"", 4, 4);
        assert_eq!(stream.length(), 0);
        assert!(stream.read_at(0, 16).unwrap().is_empty());
    }
}
