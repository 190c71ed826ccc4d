use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Crypto error: {0}")]
    Crypto(#[from] core_crypto::CryptoError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),

    #[error("Download error: {0}")]
    Download(#[from] core_download::DownloadError),
}

impl CoreError {
    /// Errors worth showing to the user rather than only logging.
    pub fn is_user_facing(&self) -> bool {
        match self {
            CoreError::Crypto(e) => e.is_user_facing(),
            CoreError::Library(e) => e.is_user_facing(),
            CoreError::Playback(e) => e.is_user_facing(),
            CoreError::Download(core_download::DownloadError::ShuttingDown) => false,
            CoreError::Download(_) => true,
            CoreError::Runtime(_) | CoreError::InitializationFailed(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
