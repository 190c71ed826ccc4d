//! Core service façade and bootstrap.
//!
//! [`VaultService::bootstrap`] wires the bridges in a [`VaultConfig`] into the
//! vault components: database and migrations, key provider, ingestion,
//! library, download manager and the event bus. Desktop hosts usually enable
//! the `desktop-shims` feature so the keychain store, filesystem blob store
//! and `yt-dlp` downloader are filled in by default.
//!
//! ```rust,ignore
//! let (dispatcher, mut ui) = bridge_desktop::ui_channel();
//! let config = VaultConfig::builder()
//!     .dispatcher(Arc::new(dispatcher))
//!     .build()?;
//! let vault = VaultService::bootstrap(config).await?;
//!
//! vault.set_completion_handler(|job| show(job.notification()));
//! vault.submit_download("https://example.com/watch?v=abc", cookies)?;
//! ui.run_blocking();
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::database::DatabaseConfig;
use bridge_traits::download::DownloadCookie;
use core_crypto::KeyProvider;
use core_download::{DownloadJob, DownloadManager, JobHandle};
use core_library::db::open_database;
use core_library::{
    IngestionPipeline, SqliteVaultEntryRepository, VaultEntry, VaultEntryId, VaultLibrary,
};
use core_playback::PlaybackSession;
use core_runtime::config::VaultConfig;
use core_runtime::events::{EventBus, EventStream};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, instrument};

/// Primary façade exposed to host applications.
pub struct VaultService {
    event_bus: EventBus,
    key_provider: Arc<KeyProvider>,
    library: Arc<VaultLibrary>,
    pipeline: Arc<IngestionPipeline>,
    downloads: DownloadManager,
    stream_cache_chunks: usize,
}

impl VaultService {
    /// Open the database and build every component from `config`.
    ///
    /// Must be called from inside a Tokio runtime; download workers use its
    /// handle to drive ingestion.
    #[instrument(skip(config), fields(data_dir = %config.data_dir.display()))]
    pub async fn bootstrap(config: VaultConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Handle::try_current().map_err(|e| {
            CoreError::InitializationFailed(format!("no Tokio runtime available: {}", e))
        })?;

        let database = open_database(DatabaseConfig::new(&config.database_path)).await?;
        let repository = Arc::new(SqliteVaultEntryRepository::new(database));
        let event_bus = EventBus::default();

        let key_provider = Arc::new(KeyProvider::new(
            Arc::clone(&config.secure_store),
            config.key_identity.clone(),
        ));

        let pipeline = Arc::new(
            IngestionPipeline::new(
                Arc::clone(&key_provider),
                Arc::clone(&config.blob_store),
                repository.clone(),
            )
            .with_chunk_size(config.chunk_size)
            .with_event_bus(event_bus.clone()),
        );

        let library = Arc::new(
            VaultLibrary::new(repository, Arc::clone(&config.blob_store))
                .with_event_bus(event_bus.clone()),
        );

        let downloads = DownloadManager::new(
            Arc::clone(&config.downloader),
            Arc::clone(&pipeline),
            Arc::clone(&config.dispatcher),
            runtime,
        )
        .with_event_bus(event_bus.clone());

        info!(entries = library.count().await?, "Vault ready");

        Ok(Self {
            event_bus,
            key_provider,
            library,
            pipeline,
            downloads,
            stream_cache_chunks: config.stream_cache_chunks,
        })
    }

    pub fn submit_download(
        &self,
        url: impl Into<String>,
        cookies: Vec<DownloadCookie>,
    ) -> Result<JobHandle> {
        Ok(self.downloads.submit(url, cookies)?)
    }

    /// Handler for finished downloads, invoked on the UI thread.
    pub fn set_completion_handler<F>(&self, handler: F)
    where
        F: Fn(&DownloadJob) + Send + Sync + 'static,
    {
        self.downloads.set_completion_handler(handler);
    }

    pub fn active_downloads(&self) -> Vec<DownloadJob> {
        self.downloads.active_jobs()
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// Encrypt a local file into the vault. The source file is left alone.
    pub async fn import_file(&self, path: &Path) -> Result<VaultEntry> {
        Ok(self.pipeline.ingest(path).await?)
    }

    /// All entries, newest first.
    pub async fn list_entries(&self) -> Result<Vec<VaultEntry>> {
        Ok(self.library.list_entries().await?)
    }

    pub async fn delete_entry(&self, id: &VaultEntryId) -> Result<()> {
        Ok(self.library.delete_entry(id).await?)
    }

    pub fn library(&self) -> &Arc<VaultLibrary> {
        &self.library
    }

    /// A fresh playback session. Sessions are independent; hosts normally
    /// keep one for the player page.
    pub fn open_session(&self) -> PlaybackSession {
        PlaybackSession::new(Arc::clone(&self.library), Arc::clone(&self.key_provider))
            .with_cache_chunks(self.stream_cache_chunks)
            .with_event_bus(self.event_bus.clone())
    }

    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Stop accepting downloads. Returns the number still in flight.
    pub fn shutdown(&self) -> usize {
        self.downloads.shutdown()
    }
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService")
            .field("downloads", &self.downloads)
            .field("stream_cache_chunks", &self.stream_cache_chunks)
            .finish()
    }
}
