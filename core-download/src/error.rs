use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloadError {
    /// `shutdown` was called; no new jobs are accepted.
    #[error("Download manager is shutting down")]
    ShuttingDown,

    /// The OS refused to start a worker thread.
    #[error("Failed to spawn download worker: {0}")]
    Spawn(String),

    #[error("Invalid job ID: {0}")]
    InvalidJobId(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The downloader failed or produced no usable file.
    #[error(transparent)]
    Downloader(#[from] BridgeError),

    /// The downloaded file could not be encrypted and stored.
    #[error(transparent)]
    Ingestion(#[from] LibraryError),

    /// The downloader or ingestion panicked on the worker thread.
    #[error("Download worker panicked: {0}")]
    WorkerPanicked(String),

    #[error("Temporary directory error: {0}")]
    TempDir(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DownloadError>;
