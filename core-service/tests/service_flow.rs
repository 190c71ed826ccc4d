//! The whole vault through its façade: download, list, play, delete.

use async_trait::async_trait;
use bridge_desktop::{ui_channel, FsBlobStore};
use bridge_traits::download::{DownloadCookie, MediaDownloader};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::{BlobStore, SecureStore};
use core_crypto::KeyIdentity;
use core_download::JobStatus;
use core_runtime::config::VaultConfig;
use core_runtime::events::{CoreEvent, LibraryEvent};
use core_service::{CoreError, VaultService};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

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

struct StaticDownloader(&'static [u8]);

impl MediaDownloader for StaticDownloader {
    fn download(
        &self,
        url: &str,
        _cookies: &[DownloadCookie],
        destination: &Path,
    ) -> BridgeResult<PathBuf> {
        if url.starts_with("bad:") {
            return Err(BridgeError::DownloadFailed("unsupported scheme".to_string()));
        }
        let path = destination.join("Summer Trip.mp4");
        std::fs::write(&path, self.0)?;
        Ok(path)
    }
}

const MEDIA: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn download_play_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(FsBlobStore::new(dir.path().join("media")).unwrap());
    let (dispatcher, mut ui) = ui_channel();

    let config = VaultConfig::builder()
        .data_dir(dir.path())
        .chunk_size(8)
        .stream_cache_chunks(2)
        .key_identity(KeyIdentity::new("VideoVault-test", "service"))
        .secure_store(Arc::new(MemorySecureStore::default()))
        .blob_store(blobs.clone())
        .downloader(Arc::new(StaticDownloader(MEDIA)))
        .dispatcher(Arc::new(dispatcher))
        .build()
        .unwrap();

    let vault = VaultService::bootstrap(config).await.unwrap();
    assert!(dir.path().join("db").join("db.sqlite3").exists());

    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    vault.set_completion_handler(move |job| sink.lock().unwrap().push(job.status));

    vault
        .submit_download("https://example.com/watch?v=1", Vec::new())
        .unwrap();
    assert!(ui.run_next_timeout(Duration::from_secs(10)).await);
    assert_eq!(*finished.lock().unwrap(), vec![JobStatus::Succeeded]);
    assert!(vault.active_downloads().is_empty());

    let entries = vault.list_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].display_name(), "Summer Trip");

    let mut session = vault.open_session();
    let mut stream = session.play(&entries[0].id).await.unwrap();
    let mut head = [0u8; 12];
    stream.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"0123456789ab");
    assert_eq!(session.stop().await.unwrap(), Some(12));

    let mut events = vault.events().filter(|e| matches!(e, CoreEvent::Library(_)));
    vault.delete_entry(&entries[0].id).await.unwrap();
    assert!(vault.list_entries().await.unwrap().is_empty());
    assert!(blobs.list().unwrap().is_empty());
    assert!(matches!(
        events.recv().await.unwrap(),
        CoreEvent::Library(LibraryEvent::EntryDeleted { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_download_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, mut ui) = ui_channel();
    let config = VaultConfig::builder()
        .data_dir(dir.path())
        .secure_store(Arc::new(MemorySecureStore::default()))
        .blob_store(Arc::new(FsBlobStore::new(dir.path().join("media")).unwrap()))
        .downloader(Arc::new(StaticDownloader(MEDIA)))
        .dispatcher(Arc::new(dispatcher))
        .build()
        .unwrap();
    let vault = VaultService::bootstrap(config).await.unwrap();

    let notes = Arc::new(Mutex::new(Vec::new()));
    let sink = notes.clone();
    vault.set_completion_handler(move |job| {
        sink.lock().unwrap().push(job.notification().unwrap().title)
    });

    vault.submit_download("bad://nowhere", Vec::new()).unwrap();
    assert!(ui.run_next_timeout(Duration::from_secs(10)).await);
    assert_eq!(
        *notes.lock().unwrap(),
        vec!["Download failed: bad://nowhere".to_string()]
    );
    assert!(vault.list_entries().await.unwrap().is_empty());

    assert_eq!(vault.shutdown(), 0);
    let err = vault
        .submit_download("https://example.com/late", Vec::new())
        .unwrap_err();
    assert!(matches!(err, CoreError::Download(_)));
    assert!(!err.is_user_facing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn import_file_keeps_the_source() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, _ui) = ui_channel();
    let config = VaultConfig::builder()
        .data_dir(dir.path())
        .secure_store(Arc::new(MemorySecureStore::default()))
        .blob_store(Arc::new(FsBlobStore::new(dir.path().join("media")).unwrap()))
        .downloader(Arc::new(StaticDownloader(MEDIA)))
        .dispatcher(Arc::new(dispatcher))
        .build()
        .unwrap();
    let vault = VaultService::bootstrap(config).await.unwrap();

    let source = dir.path().join("clip.webm");
    std::fs::write(&source, MEDIA).unwrap();
    let entry = vault.import_file(&source).await.unwrap();

    assert!(source.exists());
    assert_eq!(entry.display_name(), "clip");
    assert_eq!(vault.list_entries().await.unwrap().len(), 1);
}
