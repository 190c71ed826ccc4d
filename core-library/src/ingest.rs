//! # Ingestion Pipeline
//!
//! Turns a plaintext file into a vault entry: encrypt while streaming into
//! the blob store, then write the metadata record. Either both exist
//! afterwards or neither does.

use crate::error::{LibraryError, Result};
use crate::models::VaultEntry;
use crate::repositories::VaultEntryRepository;
use bridge_traits::storage::{BlobDeletion, BlobRef, BlobStore};
use bridge_traits::time::{Clock, SystemClock};
use core_crypto::codec::ContainerEncoder;
use core_crypto::container::DEFAULT_CHUNK_SIZE;
use core_crypto::KeyProvider;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

pub struct IngestionPipeline {
    key_provider: Arc<KeyProvider>,
    blob_store: Arc<dyn BlobStore>,
    repository: Arc<dyn VaultEntryRepository>,
    clock: Arc<dyn Clock>,
    chunk_size: u32,
    event_bus: Option<EventBus>,
}

fn failure(context: &str, err: impl std::fmt::Display) -> LibraryError {
    LibraryError::IngestionFailure(format!("{}: {}", context, err))
}

impl IngestionPipeline {
    pub fn new(
        key_provider: Arc<KeyProvider>,
        blob_store: Arc<dyn BlobStore>,
        repository: Arc<dyn VaultEntryRepository>,
    ) -> Self {
        Self {
            key_provider,
            blob_store,
            repository,
            clock: Arc::new(SystemClock),
            chunk_size: DEFAULT_CHUNK_SIZE,
            event_bus: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Encrypt and store the file at `path` as a new vault entry.
    ///
    /// The source file is left untouched; the caller owns its cleanup.
    #[instrument(skip(self, path), fields(file = %core_runtime::logging::strip_path(&path.to_string_lossy())))]
    pub async fn ingest(&self, path: &Path) -> Result<VaultEntry> {
        let (source_name, plaintext_len) = inspect_source(path)?;

        let key = self
            .key_provider
            .get_or_create_key()
            .await
            .map_err(|e| failure("cannot access secure storage", e))?;

        let store = Arc::clone(&self.blob_store);
        let source = path.to_path_buf();
        let chunk_size = self.chunk_size;
        let reference = tokio::task::spawn_blocking(move || {
            write_container(store.as_ref(), &source, plaintext_len, &key, chunk_size)
        })
        .await
        .map_err(|e| failure("encryption task failed", e))??;

        debug!(reference = %reference, plaintext_len, "Container stored");

        let entry = VaultEntry::new(reference, source_name, self.clock.unix_timestamp_millis());
        if let Err(record_err) = self.repository.insert(&entry).await {
            return Err(self.discard_blob(&entry.storage_reference, record_err).await);
        }

        info!(entry_id = %entry.id, display_name = %entry.display_name(), "Video added to vault");

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Library(LibraryEvent::EntryAdded {
                entry_id: entry.id.to_string(),
                display_name: entry.display_name(),
            }));
        }

        Ok(entry)
    }

    /// Remove a blob whose record could not be written.
    async fn discard_blob(&self, reference: &BlobRef, cause: LibraryError) -> LibraryError {
        let store = Arc::clone(&self.blob_store);
        let blob = reference.clone();
        let cleanup = tokio::task::spawn_blocking(move || store.delete(&blob)).await;

        match cleanup {
            Ok(Ok(BlobDeletion::Deleted)) | Ok(Ok(BlobDeletion::NotFound)) => {
                failure("failed to record vault entry", cause)
            }
            Ok(Err(e)) => {
                error!(reference = %reference, error = %e, "Orphaned blob could not be removed");
                LibraryError::IngestionFailure(format!(
                    "failed to record vault entry: {}; removing blob {} also failed: {}",
                    cause, reference, e
                ))
            }
            Err(e) => {
                error!(reference = %reference, error = %e, "Blob cleanup task failed");
                LibraryError::IngestionFailure(format!(
                    "failed to record vault entry: {}; blob {} may be orphaned",
                    cause, reference
                ))
            }
        }
    }
}

/// File name and size of a regular file, before anything is written.
fn inspect_source(path: &Path) -> Result<(String, u64)> {
    let metadata = std::fs::metadata(path).map_err(|e| failure("cannot read source file", e))?;
    if !metadata.is_file() {
        return Err(LibraryError::IngestionFailure(format!(
            "not a regular file: {}",
            path.display()
        )));
    }

    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            LibraryError::IngestionFailure(format!("path has no file name: {}", path.display()))
        })?;

    Ok((source_name, metadata.len()))
}

fn write_container(
    store: &dyn BlobStore,
    source: &Path,
    plaintext_len: u64,
    key: &core_crypto::VaultKey,
    chunk_size: u32,
) -> Result<BlobRef> {
    let file = File::open(source).map_err(|e| failure("cannot open source file", e))?;
    let mut encoder = ContainerEncoder::new(BufReader::new(file), plaintext_len, key, chunk_size)
        .map_err(|e| failure("cannot encrypt source file", e))?;

    store
        .put_stream(&mut encoder)
        .map_err(|e| failure("cannot store encrypted video", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockVaultEntryRepository;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::storage::SecureStore;
    use core_crypto::KeyIdentity;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySecureStore {
        secrets: Mutex<HashMap<(String, String), Vec<u8>>>,
    }

    #[async_trait]
    impl SecureStore for MemorySecureStore {
        async fn set_secret(&self, service: &str, account: &str, value: &[u8]) -> BridgeResult<()> {
            self.secrets
                .lock()
                .unwrap()
                .insert((service.into(), account.into()), value.to_vec());
            Ok(())
        }

        async fn get_secret(&self, service: &str, account: &str) -> BridgeResult<Option<Vec<u8>>> {
            Ok(self
                .secrets
                .lock()
                .unwrap()
                .get(&(service.to_string(), account.to_string()))
                .cloned())
        }

        async fn delete_secret(&self, service: &str, account: &str) -> BridgeResult<()> {
            self.secrets
                .lock()
                .unwrap()
                .remove(&(service.to_string(), account.to_string()));
            Ok(())
        }
    }

    fn key_provider() -> Arc<KeyProvider> {
        Arc::new(KeyProvider::new(
            Arc::new(MemorySecureStore::default()),
            KeyIdentity::new("test", "ingest"),
        ))
    }

    #[tokio::test]
    async fn test_directory_fails_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(bridge_desktop::FsBlobStore::new(dir.path().join("media")).unwrap());
        let mut repo = MockVaultEntryRepository::new();
        repo.expect_insert().never();

        let pipeline = IngestionPipeline::new(key_provider(), blobs.clone(), Arc::new(repo));
        let err = pipeline.ingest(dir.path()).await.unwrap_err();

        assert!(matches!(err, LibraryError::IngestionFailure(_)));
        assert!(blobs.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(bridge_desktop::FsBlobStore::new(dir.path()).unwrap());
        let pipeline = IngestionPipeline::new(
            key_provider(),
            blobs,
            Arc::new(MockVaultEntryRepository::new()),
        );

        let err = pipeline
            .ingest(&dir.path().join("missing.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::IngestionFailure(_)));
    }

    #[tokio::test]
    async fn test_record_failure_removes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("clip.mp4");
        std::fs::write(&source, vec![7u8; 1000]).unwrap();

        let blobs = Arc::new(bridge_desktop::FsBlobStore::new(dir.path().join("media")).unwrap());
        let mut repo = MockVaultEntryRepository::new();
        repo.expect_insert().times(1).returning(|_| {
            Err(LibraryError::Bridge(
                bridge_traits::BridgeError::DatabaseError("disk full".into()),
            ))
        });

        let pipeline = IngestionPipeline::new(key_provider(), blobs.clone(), Arc::new(repo))
            .with_chunk_size(64);
        let err = pipeline.ingest(&source).await.unwrap_err();

        assert!(matches!(err, LibraryError::IngestionFailure(_)));
        assert!(blobs.list().unwrap().is_empty());
        assert!(source.exists());
    }
}
