//! # Playback Session
//!
//! At most one entry plays at a time. Starting an entry stops the current one
//! first, and stopping writes the stop position back to the library so the
//! next `play` resumes there.

use crate::error::{PlaybackError, Result};
use crate::stream::{EncryptedStream, StreamHandle};
use core_crypto::KeyProvider;
use core_library::{VaultEntry, VaultEntryId, VaultLibrary};
use core_runtime::config::DEFAULT_STREAM_CACHE_CHUNKS;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::io::{Seek, SeekFrom};
use std::sync::Arc;
use tracing::{info, instrument, warn};

struct NowPlaying {
    entry: VaultEntry,
    stream: StreamHandle,
}

pub struct PlaybackSession {
    library: Arc<VaultLibrary>,
    key_provider: Arc<KeyProvider>,
    cache_chunks: usize,
    event_bus: Option<EventBus>,
    current: Option<NowPlaying>,
}

impl PlaybackSession {
    pub fn new(library: Arc<VaultLibrary>, key_provider: Arc<KeyProvider>) -> Self {
        Self {
            library,
            key_provider,
            cache_chunks: DEFAULT_STREAM_CACHE_CHUNKS,
            event_bus: None,
            current: None,
        }
    }

    /// Decrypted chunks each stream keeps in memory.
    pub fn with_cache_chunks(mut self, cache_chunks: usize) -> Self {
        self.cache_chunks = cache_chunks;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    pub fn current_entry(&self) -> Option<&VaultEntry> {
        self.current.as_ref().map(|p| &p.entry)
    }

    /// Handle to the open stream, if something is playing.
    pub fn stream(&self) -> Option<StreamHandle> {
        self.current.as_ref().map(|p| p.stream.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    /// Start playing `id`, resuming at its saved position.
    ///
    /// A saved position past the end of the media is clamped to the end.
    /// A corrupt or tampered container fails here with a fatal error and a
    /// `PlaybackEvent::Error`; the entry stays in the library.
    #[instrument(skip(self, id), fields(entry_id = %id))]
    pub async fn play(&mut self, id: &VaultEntryId) -> Result<StreamHandle> {
        if let Err(e) = self.stop().await {
            // The previous entry may have been deleted while it played.
            warn!(error = %e, "Could not save position of previous entry");
        }

        let entry = self.library.get_entry(id).await?;
        let key = self.key_provider.get_or_create_key().await?;

        let store = Arc::clone(self.library.blob_store());
        let reference = entry.storage_reference.clone();
        let cache_chunks = self.cache_chunks;
        let opened = tokio::task::spawn_blocking(move || {
            EncryptedStream::open(store.as_ref(), &reference, &key, cache_chunks)
        })
        .await
        .map_err(|e| PlaybackError::Internal(format!("stream open task failed: {}", e)))?;

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                if e.is_playback_fatal() {
                    warn!(error = %e, "Entry cannot be played");
                    self.emit(PlaybackEvent::Error {
                        entry_id: id.to_string(),
                        message: e.to_string(),
                    });
                }
                return Err(e);
            }
        };

        let position = entry.last_position.min(stream.length());
        stream.seek(SeekFrom::Start(position))?;

        let handle = StreamHandle::new(stream);
        info!(
            display_name = %entry.display_name(),
            position,
            "Playback started"
        );
        self.emit(PlaybackEvent::Started {
            entry_id: id.to_string(),
            position,
        });

        self.current = Some(NowPlaying {
            entry,
            stream: handle.clone(),
        });
        Ok(handle)
    }

    /// Stop at the stream's current position and save it.
    ///
    /// Returns the saved position, or `None` when nothing was playing.
    pub async fn stop(&mut self) -> Result<Option<u64>> {
        let Some(playing) = self.current.take() else {
            return Ok(None);
        };
        let position = playing.stream.close();
        self.finish(playing.entry, position).await.map(Some)
    }

    /// Stop and save `position` instead of the stream's read position, for
    /// players that report progress in their own terms.
    pub async fn stop_at(&mut self, position: u64) -> Result<Option<u64>> {
        let Some(playing) = self.current.take() else {
            return Ok(None);
        };
        playing.stream.close();
        self.finish(playing.entry, position).await.map(Some)
    }

    async fn finish(&self, entry: VaultEntry, position: u64) -> Result<u64> {
        if let Err(e) = self.library.save_position(&entry.id, position).await {
            warn!(entry_id = %entry.id, error = %e, "Could not save playback position");
            return Err(e.into());
        }

        info!(display_name = %entry.display_name(), position, "Playback stopped");
        self.emit(PlaybackEvent::Stopped {
            entry_id: entry.id.to_string(),
            position,
        });
        Ok(position)
    }
}

impl std::fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("current", &self.current_entry().map(|e| e.id.to_string()))
            .field("cache_chunks", &self.cache_chunks)
            .finish()
    }
}
