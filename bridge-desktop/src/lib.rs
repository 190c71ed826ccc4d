//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `SecureStore` using the `keyring` crate
//! - `BlobStore` as one file per container in the media directory
//! - `MediaDownloader` driving the `yt-dlp` executable
//! - `UiDispatcher` as a channel drained by the UI thread
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ui_channel, FsBlobStore, YtDlpDownloader};
//!
//! let blobs = FsBlobStore::new(FsBlobStore::default_root("VideoVault"))?;
//! let downloader = YtDlpDownloader::discover()?;
//! let (dispatcher, mut ui_loop) = ui_channel();
//! ```

mod blob_store;
mod downloader;
mod ui_loop;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use blob_store::{FsBlobStore, BLOB_EXTENSION};
pub use downloader::{find_executable, netscape_cookie_file, YtDlpDownloader};
pub use ui_loop::{ui_channel, ChannelDispatcher, UiEventLoop};

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
