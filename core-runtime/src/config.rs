//! # Vault Configuration Module
//!
//! Provides configuration management for the video vault core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `VaultConfig`
//! instance that holds all necessary dependencies and settings for the core
//! library. It enforces fail-fast validation to ensure all required bridges are
//! provided before initialization.
//!
//! ## Required Dependencies
//!
//! - `SecureStore` - holds the vault key
//! - `BlobStore` - holds encrypted containers
//! - `MediaDownloader` - fetches remote videos
//! - `UiDispatcher` - delivers download completions on the UI thread
//!
//! When the `desktop-shims` feature is enabled, desktop implementations of the
//! first three are injected automatically if not provided. The dispatcher is
//! always supplied by the host, since only the host owns its UI thread.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::VaultConfig;
//! use std::sync::Arc;
//!
//! let (dispatcher, ui_loop) = bridge_desktop::ui_channel();
//! let config = VaultConfig::builder()
//!     .data_dir("/path/to/VideoVault")
//!     .dispatcher(Arc::new(dispatcher))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::VaultConfig;
//!
//! // Panics with an actionable error: no dispatcher was injected.
//! let config = VaultConfig::builder()
//!     .data_dir("/tmp/vault")
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{BlobStore, MediaDownloader, SecureStore, UiDispatcher};
use core_crypto::container::{validate_chunk_size, DEFAULT_CHUNK_SIZE};
use core_crypto::KeyIdentity;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory name under the platform data directory.
pub const APP_DIR_NAME: &str = "VideoVault";

/// Decrypted chunks kept per open stream.
pub const DEFAULT_STREAM_CACHE_CHUNKS: usize = 4;

/// Core configuration for the video vault.
///
/// Use [`VaultConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct VaultConfig {
    /// Root of everything the vault persists
    pub data_dir: PathBuf,

    /// SQLite database holding vault entries
    pub database_path: PathBuf,

    /// Directory of the default blob store
    pub media_dir: PathBuf,

    /// Plaintext bytes per encrypted chunk for new containers
    pub chunk_size: u32,

    /// Decrypted chunks cached per playback stream (0 disables)
    pub stream_cache_chunks: usize,

    /// Where the vault key lives in the credential store
    pub key_identity: KeyIdentity,

    pub secure_store: Arc<dyn SecureStore>,
    pub blob_store: Arc<dyn BlobStore>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub dispatcher: Arc<dyn UiDispatcher>,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("data_dir", &self.data_dir)
            .field("database_path", &self.database_path)
            .field("media_dir", &self.media_dir)
            .field("chunk_size", &self.chunk_size)
            .field("stream_cache_chunks", &self.stream_cache_chunks)
            .field("key_identity", &self.key_identity)
            .field("secure_store", &"SecureStore { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .field("downloader", &"MediaDownloader { ... }")
            .field("dispatcher", &"UiDispatcher { ... }")
            .finish()
    }
}

impl VaultConfig {
    /// Creates a new builder for constructing a `VaultConfig`.
    pub fn builder() -> VaultConfigBuilder {
        VaultConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.media_dir.as_os_str().is_empty() {
            return Err(Error::Config("Media directory cannot be empty".to_string()));
        }

        validate_chunk_size(self.chunk_size)
            .map_err(|e| Error::Config(format!("Invalid chunk size: {}", e)))?;

        if self.key_identity.app_id.is_empty() || self.key_identity.account_id.is_empty() {
            return Err(Error::Config(
                "Key identity needs a non-empty app id and account id".to_string(),
            ));
        }

        Ok(())
    }
}

/// `dirs::data_dir()/VideoVault`, if the platform has a data directory.
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join(APP_DIR_NAME))
}

fn dispatcher_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "UiDispatcher".to_string(),
        message: "A UiDispatcher is required to deliver download completions on the UI thread. \
                 Desktop: create one with bridge_desktop::ui_channel() and drain the returned \
                 UiEventLoop from the UI thread."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(Error::CapabilityMissing {
        capability: "SecureStore".to_string(),
        message: "SecureStore implementation is required to hold the vault key. \
                 Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
                 Otherwise inject the platform's credential store."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_blob_store(media_dir: &Path) -> Result<Arc<dyn BlobStore>> {
    use bridge_desktop::FsBlobStore;

    let store = FsBlobStore::new(media_dir).map_err(|e| {
        Error::Internal(format!(
            "Failed to initialize default BlobStore at {}: {}",
            media_dir.display(),
            e
        ))
    })?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_blob_store(_media_dir: &Path) -> Result<Arc<dyn BlobStore>> {
    Err(Error::CapabilityMissing {
        capability: "BlobStore".to_string(),
        message: "BlobStore implementation is required to hold encrypted videos. \
                 Desktop: enable the 'desktop-shims' feature to use the default FsBlobStore."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_downloader() -> Result<Arc<dyn MediaDownloader>> {
    use bridge_desktop::YtDlpDownloader;

    let downloader = YtDlpDownloader::discover().map_err(|e| Error::CapabilityMissing {
        capability: "MediaDownloader".to_string(),
        message: format!(
            "No downloader injected and yt-dlp could not be found on PATH ({}). \
             Install yt-dlp or inject a MediaDownloader implementation.",
            e
        ),
    })?;
    Ok(Arc::new(downloader))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_downloader() -> Result<Arc<dyn MediaDownloader>> {
    Err(Error::CapabilityMissing {
        capability: "MediaDownloader".to_string(),
        message: "MediaDownloader implementation is required for remote downloads. \
                 Desktop: enable the 'desktop-shims' feature to use yt-dlp."
            .to_string(),
    })
}

/// Builder for constructing [`VaultConfig`] instances.
#[derive(Default)]
pub struct VaultConfigBuilder {
    data_dir: Option<PathBuf>,
    database_path: Option<PathBuf>,
    media_dir: Option<PathBuf>,
    chunk_size: Option<u32>,
    stream_cache_chunks: Option<usize>,
    key_identity: Option<KeyIdentity>,
    secure_store: Option<Arc<dyn SecureStore>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    downloader: Option<Arc<dyn MediaDownloader>>,
    dispatcher: Option<Arc<dyn UiDispatcher>>,
}

impl VaultConfigBuilder {
    /// Sets the data directory.
    ///
    /// Default: the platform data directory joined with `VideoVault`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::VaultConfig;
    ///
    /// let builder = VaultConfig::builder()
    ///     .data_dir("/path/to/VideoVault");
    /// ```
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Overrides the database path. Default: `<data_dir>/db/db.sqlite3`.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Overrides the media directory. Default: `<data_dir>/media`.
    pub fn media_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.media_dir = Some(path.into());
        self
    }

    /// Sets the plaintext chunk size for new containers.
    ///
    /// Default: 256 KiB. Must be between 1 byte and 64 MiB.
    pub fn chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets how many decrypted chunks each playback stream caches.
    ///
    /// Default: 4. Zero disables the cache.
    pub fn stream_cache_chunks(mut self, chunks: usize) -> Self {
        self.stream_cache_chunks = Some(chunks);
        self
    }

    pub fn key_identity(mut self, identity: KeyIdentity) -> Self {
        self.key_identity = Some(identity);
        self
    }

    /// Sets the secure store implementation.
    ///
    /// Holds the vault key. Must provide platform-appropriate protection
    /// (Keychain on macOS, Credential Manager on Windows, Secret Service on
    /// Linux).
    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn downloader(mut self, downloader: Arc<dyn MediaDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Sets the UI dispatcher (required).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn UiDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Builds the final `VaultConfig` instance.
    ///
    /// Returns an error if:
    /// - No data directory was given and the platform has none
    /// - Required bridges are missing and no default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<VaultConfig> {
        let dispatcher = self.dispatcher.ok_or_else(dispatcher_missing_error)?;

        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => default_data_dir().ok_or_else(|| {
                Error::Config(
                    "No platform data directory found. Use .data_dir() to set it.".to_string(),
                )
            })?,
        };

        let database_path = self
            .database_path
            .unwrap_or_else(|| data_dir.join("db").join("db.sqlite3"));
        let media_dir = self.media_dir.unwrap_or_else(|| data_dir.join("media"));
        let chunk_size = self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);

        // Reject bad values before any default bridge touches the disk.
        validate_chunk_size(chunk_size)
            .map_err(|e| Error::Config(format!("Invalid chunk size: {}", e)))?;

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let blob_store = match self.blob_store {
            Some(store) => store,
            None => provide_default_blob_store(&media_dir)?,
        };

        let downloader = match self.downloader {
            Some(downloader) => downloader,
            None => provide_default_downloader()?,
        };

        let config = VaultConfig {
            data_dir,
            database_path,
            media_dir,
            chunk_size,
            stream_cache_chunks: self
                .stream_cache_chunks
                .unwrap_or(DEFAULT_STREAM_CACHE_CHUNKS),
            key_identity: self.key_identity.unwrap_or_default(),
            secure_store,
            blob_store,
            downloader,
            dispatcher,
        };

        config.validate()?;

        Ok(config)
    }
}
