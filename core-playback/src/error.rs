//! # Playback Error Types

use bridge_traits::error::BridgeError;
use core_crypto::error::CryptoError;
use core_library::error::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Container could not be decrypted: missing key, corrupt or tampered.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Entry lookup or position write-back failed.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// The blob store could not open the container.
    #[error("Failed to open stored video: {0}")]
    Source(#[from] BridgeError),

    /// The stream was closed; reopen the entry to keep reading.
    #[error("Stream is closed")]
    StreamClosed,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Errors that make this one entry unplayable. The entry stays in the
    /// listing so the user can delete it.
    pub fn is_playback_fatal(&self) -> bool {
        match self {
            PlaybackError::Crypto(e) => e.is_playback_fatal(),
            PlaybackError::Source(BridgeError::BlobNotFound(_)) => true,
            _ => false,
        }
    }

    /// `true` when the vault key itself could not be obtained.
    pub fn is_key_unavailable(&self) -> bool {
        matches!(self, PlaybackError::Crypto(CryptoError::KeyUnavailable(_)))
    }

    pub fn is_user_facing(&self) -> bool {
        match self {
            PlaybackError::Crypto(e) => e.is_user_facing(),
            PlaybackError::Library(e) => e.is_user_facing(),
            PlaybackError::Source(_) => true,
            PlaybackError::StreamClosed | PlaybackError::IoError(_) | PlaybackError::Internal(_) => {
                false
            }
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
