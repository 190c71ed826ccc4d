//! # Downloads
//!
//! Download jobs: fetch a video with the external downloader, encrypt it
//! into the vault, and report the outcome on the UI thread.
//!
//! ## State machine
//!
//! `Pending → Running → Succeeded | Failed`; see [`job`].
//!
//! ## Threads
//!
//! Every job runs on its own OS thread, so a slow download never holds up
//! another. Completions are posted through the host's
//! [`UiDispatcher`](bridge_traits::UiDispatcher) and delivered one at a time.

pub mod error;
pub mod job;
pub mod manager;

pub use error::{DownloadError, Result};
pub use job::{DownloadJob, JobId, JobOutcome, JobStatus, Notification};
pub use manager::{CompletionHandler, DownloadManager, JobHandle};
