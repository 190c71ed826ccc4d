//! # Vault Library
//!
//! Listing, lookup, position updates and deletion of vault entries. Deletion
//! spans two stores: the blob goes first and the record is only removed once
//! the blob is gone (or was already missing), so a failure can never leave
//! ciphertext that nothing points to.

use crate::error::{LibraryError, Result};
use crate::models::{VaultEntry, VaultEntryId};
use crate::repositories::VaultEntryRepository;
use bridge_traits::storage::{BlobDeletion, BlobStore};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct VaultLibrary {
    repository: Arc<dyn VaultEntryRepository>,
    blob_store: Arc<dyn BlobStore>,
    event_bus: Option<EventBus>,
}

impl VaultLibrary {
    pub fn new(repository: Arc<dyn VaultEntryRepository>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            repository,
            blob_store,
            event_bus: None,
        }
    }

    /// Publish `LibraryEvent`s on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blob_store
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Library(event));
        }
    }

    /// All entries, newest first.
    pub async fn list_entries(&self) -> Result<Vec<VaultEntry>> {
        self.repository.list_recent().await
    }

    pub async fn get_entry(&self, id: &VaultEntryId) -> Result<VaultEntry> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::not_found(id))
    }

    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }

    /// Record where playback of `id` stopped.
    #[instrument(skip(self))]
    pub async fn save_position(&self, id: &VaultEntryId, position: u64) -> Result<()> {
        if !self.repository.update_position(id, position).await? {
            return Err(LibraryError::not_found(id));
        }

        self.emit(LibraryEvent::PositionSaved {
            entry_id: id.to_string(),
            position,
        });
        Ok(())
    }

    /// Delete the blob, then the record.
    ///
    /// A blob that is already gone counts as deleted. Any other blob failure
    /// leaves the record in place and returns [`LibraryError::BlobDeletion`].
    #[instrument(skip(self))]
    pub async fn delete_entry(&self, id: &VaultEntryId) -> Result<()> {
        let entry = self.get_entry(id).await?;
        let reference = entry.storage_reference.clone();

        let store = Arc::clone(&self.blob_store);
        let blob_reference = reference.clone();
        let outcome = tokio::task::spawn_blocking(move || store.delete(&blob_reference))
            .await
            .map_err(|e| LibraryError::BlobDeletion {
                reference: reference.to_string(),
                message: format!("blob deletion task failed: {}", e),
            })?;

        match outcome {
            Ok(BlobDeletion::Deleted) => {}
            Ok(BlobDeletion::NotFound) => {
                warn!(reference = %reference, "Blob already missing; removing record");
            }
            Err(e) => {
                warn!(reference = %reference, error = %e, "Blob deletion failed; keeping record");
                return Err(LibraryError::BlobDeletion {
                    reference: reference.to_string(),
                    message: e.to_string(),
                });
            }
        }

        self.repository.delete(id).await?;
        info!(display_name = %entry.display_name(), "Vault entry deleted");

        self.emit(LibraryEvent::EntryDeleted {
            entry_id: id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockVaultEntryRepository;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::{BlobReader, BlobRef};
    use mockall::mock;
    use mockall::predicate::eq;
    use std::io::Read;

    mock! {
        pub Blobs {}

        impl BlobStore for Blobs {
            fn put_stream(&self, reader: &mut dyn Read) -> BridgeResult<BlobRef>;
            fn open(&self, reference: &BlobRef) -> BridgeResult<Box<dyn BlobReader>>;
            fn delete(&self, reference: &BlobRef) -> BridgeResult<BlobDeletion>;
            fn list(&self) -> BridgeResult<Vec<BlobRef>>;
        }
    }

    fn stored_entry() -> VaultEntry {
        VaultEntry::new(BlobRef::new("abc.vault"), "clip.mp4", 10)
    }

    fn repo_with(entry: &VaultEntry) -> MockVaultEntryRepository {
        let mut repo = MockVaultEntryRepository::new();
        let found = entry.clone();
        repo.expect_find_by_id()
            .with(eq(entry.id))
            .returning(move |_| Ok(Some(found.clone())));
        repo
    }

    #[tokio::test]
    async fn test_blob_failure_keeps_record() {
        let entry = stored_entry();
        let mut repo = repo_with(&entry);
        repo.expect_delete().never();

        let mut blobs = MockBlobs::new();
        blobs
            .expect_delete()
            .returning(|_| Err(BridgeError::OperationFailed("file is locked".into())));

        let library = VaultLibrary::new(Arc::new(repo), Arc::new(blobs));
        let err = library.delete_entry(&entry.id).await.unwrap_err();
        assert!(matches!(err, LibraryError::BlobDeletion { .. }));
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn test_missing_blob_still_removes_record() {
        let entry = stored_entry();
        let mut repo = repo_with(&entry);
        repo.expect_delete()
            .with(eq(entry.id))
            .times(1)
            .returning(|_| Ok(true));

        let mut blobs = MockBlobs::new();
        blobs
            .expect_delete()
            .returning(|_| Ok(BlobDeletion::NotFound));

        let library = VaultLibrary::new(Arc::new(repo), Arc::new(blobs));
        library.delete_entry(&entry.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_emits_event() {
        let entry = stored_entry();
        let mut repo = repo_with(&entry);
        repo.expect_delete().returning(|_| Ok(true));

        let mut blobs = MockBlobs::new();
        blobs
            .expect_delete()
            .with(eq(BlobRef::new("abc.vault")))
            .returning(|_| Ok(BlobDeletion::Deleted));

        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let library = VaultLibrary::new(Arc::new(repo), Arc::new(blobs)).with_event_bus(bus);

        library.delete_entry(&entry.id).await.unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Library(LibraryEvent::EntryDeleted {
                entry_id: entry.id.to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_delete_unknown_entry_is_not_found() {
        let mut repo = MockVaultEntryRepository::new();
        repo.expect_find_by_id().returning(|_| Ok(None));
        let mut blobs = MockBlobs::new();
        blobs.expect_delete().never();

        let library = VaultLibrary::new(Arc::new(repo), Arc::new(blobs));
        assert!(matches!(
            library.delete_entry(&VaultEntryId::new()).await,
            Err(LibraryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_position_unknown_entry() {
        let mut repo = MockVaultEntryRepository::new();
        repo.expect_update_position().returning(|_, _| Ok(false));

        let library = VaultLibrary::new(Arc::new(repo), Arc::new(MockBlobs::new()));
        assert!(matches!(
            library.save_position(&VaultEntryId::new(), 10).await,
            Err(LibraryError::NotFound { .. })
        ));
    }
}
