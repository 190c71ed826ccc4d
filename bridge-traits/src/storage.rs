//! Storage Abstractions
//!
//! Two kinds of persistence sit outside the core:
//! - [`SecureStore`]: the platform credential store holding the vault key
//! - [`BlobStore`]: opaque storage for encrypted containers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Seek};

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts the OS credential store:
/// - macOS: Keychain
/// - Windows: Credential Manager
/// - Linux: Secret Service
///
/// Secrets are addressed by a `(service, account)` pair, mirroring how the
/// platform stores address credentials.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Use platform-provided secure storage
/// - Never log or expose secret values
///
/// The core does not assume implementations are safe against concurrent
/// get-then-set races; callers creating secrets serialize that themselves.
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value.
    async fn set_secret(&self, service: &str, account: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if no secret exists for the pair.
    async fn get_secret(&self, service: &str, account: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing secret succeeds.
    async fn delete_secret(&self, service: &str, account: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, service: &str, account: &str) -> Result<bool> {
        Ok(self.get_secret(service, account).await?.is_some())
    }
}

/// Opaque handle to a stored blob.
///
/// The core never interprets the contents; only the store that issued a
/// reference knows how to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a blob deletion that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobDeletion {
    Deleted,
    NotFound,
}

/// Random-access reader over a stored blob.
pub trait BlobReader: Read + Seek + Send {}

impl<T: Read + Seek + Send> BlobReader for T {}

/// Blob storage trait
///
/// Blob operations are synchronous: containers are read from the thread that
/// drives the media decoder and written from download worker threads, both of
/// which may block on local disk I/O.
///
/// # Atomicity
///
/// `put`/`put_stream` must never make a partially written blob reachable
/// through a reference. Either the call returns a reference to the complete
/// blob, or it fails and nothing is left behind.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a fresh reference.
    fn put(&self, bytes: &[u8]) -> Result<BlobRef> {
        self.put_stream(&mut std::io::Cursor::new(bytes))
    }

    /// Store everything `reader` yields under a fresh reference.
    fn put_stream(&self, reader: &mut dyn Read) -> Result<BlobRef>;

    /// Open a blob for random access.
    ///
    /// Fails with [`BridgeError::BlobNotFound`](crate::BridgeError::BlobNotFound)
    /// when the reference does not resolve.
    fn open(&self, reference: &BlobRef) -> Result<Box<dyn BlobReader>>;

    /// Delete a blob.
    fn delete(&self, reference: &BlobRef) -> Result<BlobDeletion>;

    /// List every stored reference.
    fn list(&self) -> Result<Vec<BlobRef>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_ref_is_transparent_in_json() {
        let reference = BlobRef::new("abc.vault");
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, "\"abc.vault\"");
        assert_eq!(reference.to_string(), "abc.vault");
    }

    #[test]
    fn test_boxed_cursor_is_blob_reader() {
        let reader: Box<dyn BlobReader> = Box::new(std::io::Cursor::new(vec![1u8, 2, 3]));
        let mut reader = reader;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
    }
}
