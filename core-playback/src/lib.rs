//! # Playback
//!
//! Serves decrypted media to the player without writing plaintext to disk.
//!
//! - [`EncryptedStream`]: seekable plaintext view over a stored container,
//!   decrypting only the chunks a read touches.
//! - [`PlaybackSession`]: one entry at a time, resuming at the saved
//!   position and saving it again on stop.

pub mod error;
pub mod session;
pub mod stream;

pub use error::{PlaybackError, Result};
pub use session::PlaybackSession;
pub use stream::{EncryptedStream, StreamHandle, StreamStats};
