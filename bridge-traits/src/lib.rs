//! # Host Bridge Traits
//!
//! Contracts for everything the vault core relies on but does not own.
//!
//! ## Overview
//!
//! The core encrypts, stores, plays back and downloads media, but the pieces
//! that differ per host (credential storage, where blobs live, which download
//! tool is installed, how the UI thread receives work) sit behind the traits
//! in this crate.
//!
//! ## Traits
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - OS credential store holding the vault key
//! - [`BlobStore`](storage::BlobStore) - Opaque storage for encrypted containers
//! - [`DatabaseAdapter`](database::DatabaseAdapter) - Relational store for vault entry metadata
//!
//! ### Integration
//! - [`MediaDownloader`](download::MediaDownloader) - External tool producing a plaintext media file
//! - [`UiDispatcher`](background::UiDispatcher) - Marshals completions onto the UI thread
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing instead of silently falling back:
//!
//! ```ignore
//! let blob_store = config.blob_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "BlobStore".to_string(),
//!         message: "No blob store provided. \
//!                  Desktop: enable the desktop-shims feature.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform errors into it and keep the context (paths, tool output)
//! in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the same instances are used from
//! the UI thread and from download worker threads.

pub mod background;
pub mod database;
pub mod download;
pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use background::{UiDispatcher, UiTask};
pub use database::{DatabaseAdapter, DatabaseConfig, QueryRow, QueryValue};
pub use download::{DownloadCookie, MediaDownloader};
pub use storage::{BlobDeletion, BlobReader, BlobRef, BlobStore, SecureStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
