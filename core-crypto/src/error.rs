use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    /// The credential store is unreachable or would not hold the key.
    #[error("Cannot access secure storage: {0}")]
    KeyUnavailable(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Header malformed, inconsistent, or the container was truncated.
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// A chunk's tag did not verify. No plaintext from the call is returned.
    #[error("Authentication failed for chunk {chunk}")]
    AuthenticationFailure { chunk: u32 },

    #[error("Range out of bounds: offset {offset} + length {length} exceeds length {total}")]
    OutOfRange { offset: u64, length: u64, total: u64 },

    #[error("Invalid chunk size {0}")]
    InvalidChunkSize(u32),

    #[error("Plaintext too large for the container format: {0} bytes")]
    PlaintextTooLarge(u64),

    #[error("Plaintext source changed while encoding: {0}")]
    SourceChanged(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Errors that make one vault entry unplayable without affecting others.
    pub fn is_playback_fatal(&self) -> bool {
        matches!(
            self,
            CryptoError::CorruptContainer(_) | CryptoError::AuthenticationFailure { .. }
        )
    }

    /// Errors worth showing to the user. `OutOfRange` and chunk-size errors
    /// are caller bugs.
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            CryptoError::OutOfRange { .. } | CryptoError::InvalidChunkSize(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
