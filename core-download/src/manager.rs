//! # Download Job Manager
//!
//! Runs every submitted download on its own OS thread and reports the
//! outcome on the UI thread.
//!
//! ```text
//!  UI thread                      worker thread (one per job)
//!  ─────────                      ───────────────────────────
//!  submit(url) ──► registry += job ──► spawn ──► downloader.download()
//!                                                   │  (blocks this thread)
//!                                                   ▼
//!                                           pipeline.ingest()  (block_on)
//!                                                   │
//!  ┌── UiDispatcher ◄───────────────────────────────┘
//!  ▼
//!  lock registry ─► remove job ─► completion handler ─► unlock
//! ```
//!
//! The registry only ever holds pending or running jobs. A job leaves it in
//! the same critical section that delivers its completion, so no caller can
//! see a finished job in `active_jobs()` or a job that is neither listed nor
//! delivered.

use crate::error::{DownloadError, Result};
use crate::job::{DownloadJob, JobId, JobOutcome};
use bridge_traits::background::{UiDispatcher, UiTask};
use bridge_traits::download::{DownloadCookie, MediaDownloader};
use bridge_traits::error::BridgeError;
use core_library::{IngestionPipeline, VaultEntry};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use parking_lot::ReentrantMutex;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;
use tracing::{debug, error, info, instrument, warn};

/// Called on the UI thread with each finished job.
pub type CompletionHandler = Arc<dyn Fn(&DownloadJob) + Send + Sync>;

/// Returned by [`DownloadManager::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    id: JobId,
    url: String,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
struct Registry {
    jobs: HashMap<JobId, DownloadJob>,
    handler: Option<CompletionHandler>,
}

impl Registry {
    /// List `job` as pending, then move it to running. A job that cannot
    /// start is not left behind.
    fn register(&mut self, job: DownloadJob) -> Result<DownloadJob> {
        let id = job.id;
        self.jobs.insert(id, job.clone());
        match job.start() {
            Ok(running) => {
                self.jobs.insert(id, running.clone());
                Ok(running)
            }
            Err(e) => {
                self.jobs.remove(&id);
                Err(e)
            }
        }
    }
}

struct Shared {
    // Re-entrant so a completion handler may query the manager while the
    // registry is locked for its delivery.
    registry: ReentrantMutex<RefCell<Registry>>,
    downloader: Arc<dyn MediaDownloader>,
    pipeline: Arc<IngestionPipeline>,
    dispatcher: Arc<dyn UiDispatcher>,
    runtime: Handle,
    event_bus: Option<EventBus>,
    temp_root: Option<PathBuf>,
    shutting_down: AtomicBool,
}

pub struct DownloadManager {
    shared: Arc<Shared>,
}

impl DownloadManager {
    /// `runtime` drives ingestion from the worker threads, which are not
    /// runtime threads themselves.
    pub fn new(
        downloader: Arc<dyn MediaDownloader>,
        pipeline: Arc<IngestionPipeline>,
        dispatcher: Arc<dyn UiDispatcher>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: ReentrantMutex::new(RefCell::new(Registry::default())),
                downloader,
                pipeline,
                dispatcher,
                runtime,
                event_bus: None,
                temp_root: None,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Publish `DownloadEvent`s on `bus`. Must be called before the first
    /// submission.
    pub fn with_event_bus(self, bus: EventBus) -> Self {
        self.map_shared(|shared| shared.event_bus = Some(bus))
    }

    /// Directory under which per-job temporary directories are created.
    /// Defaults to the system temp directory.
    pub fn with_temp_root(self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        self.map_shared(|shared| shared.temp_root = Some(root))
    }

    fn map_shared(self, f: impl FnOnce(&mut Shared)) -> Self {
        match Arc::try_unwrap(self.shared) {
            Ok(mut shared) => {
                f(&mut shared);
                Self {
                    shared: Arc::new(shared),
                }
            }
            // Jobs already hold the state; keep it unchanged.
            Err(shared) => {
                warn!("Download manager already in use; configuration change ignored");
                Self { shared }
            }
        }
    }

    /// Replace the completion handler. Jobs still in flight report to the
    /// new handler.
    pub fn set_completion_handler<F>(&self, handler: F)
    where
        F: Fn(&DownloadJob) + Send + Sync + 'static,
    {
        let registry = self.shared.registry.lock();
        registry.borrow_mut().handler = Some(Arc::new(handler));
    }

    pub fn clear_completion_handler(&self) {
        let registry = self.shared.registry.lock();
        registry.borrow_mut().handler = None;
    }

    /// Start downloading `url` on a new worker thread.
    ///
    /// Download and ingestion failures never surface here; they arrive as a
    /// failed job through the completion handler.
    #[instrument(skip_all, fields(cookies = cookies.len()))]
    pub fn submit(&self, url: impl Into<String>, cookies: Vec<DownloadCookie>) -> Result<JobHandle> {
        if self.shared.shutting_down.load(Ordering::SeqCst) {
            return Err(DownloadError::ShuttingDown);
        }

        let job = DownloadJob::new(url);
        let handle = JobHandle {
            id: job.id,
            url: job.url.clone(),
        };

        let job = {
            let registry = self.shared.registry.lock();
            let mut registry = registry.borrow_mut();
            registry.register(job)?
        };
        self.shared.emit(DownloadEvent::Started {
            job_id: job.id.to_string(),
        });

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("vault-download-{}", job.id.short()))
            .spawn(move || shared.run(job, cookies));

        if let Err(e) = spawned {
            error!(job_id = %handle.id, error = %e, "Could not start download worker");
            let registry = self.shared.registry.lock();
            registry.borrow_mut().jobs.remove(&handle.id);
            self.shared.emit(DownloadEvent::Failed {
                job_id: handle.id.to_string(),
                url: handle.url.clone(),
                message: e.to_string(),
            });
            return Err(DownloadError::Spawn(e.to_string()));
        }

        debug!(job_id = %handle.id, url = %handle.url, "Download URL");
        info!(job_id = %handle.id, "Download submitted");
        Ok(handle)
    }

    /// Snapshots of every pending or running job.
    pub fn active_jobs(&self) -> Vec<DownloadJob> {
        let registry = self.shared.registry.lock();
        let mut jobs: Vec<DownloadJob> = registry.borrow().jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn is_active(&self, id: &JobId) -> bool {
        let registry = self.shared.registry.lock();
        let active = registry.borrow().jobs.contains_key(id);
        active
    }

    pub fn active_count(&self) -> usize {
        let registry = self.shared.registry.lock();
        let count = registry.borrow().jobs.len();
        count
    }

    /// Refuse new submissions. In-flight workers keep running; their
    /// outcomes are dropped once the UI loop is gone.
    ///
    /// Returns the number of jobs still in flight.
    pub fn shutdown(&self) -> usize {
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        let in_flight = self.active_count();
        info!(in_flight, "Download manager shut down");
        in_flight
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.shutting_down.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for DownloadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadManager")
            .field("active", &self.active_count())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Shared {
    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Download(event));
        }
    }

    /// Worker thread body.
    fn run(self: Arc<Self>, job: DownloadJob, cookies: Vec<DownloadCookie>) {
        let job_id = job.id;
        debug!(job_id = %job_id, "Download worker started");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.download_and_ingest(&job.url, &cookies)
        }))
        .unwrap_or_else(|payload| Err(DownloadError::WorkerPanicked(panic_message(&*payload))));

        let finished = match outcome {
            Ok(entry) => {
                info!(job_id = %job_id, display_name = %entry.display_name(), "Download stored");
                self.emit(DownloadEvent::Succeeded {
                    job_id: job_id.to_string(),
                    entry_id: entry.id.to_string(),
                    display_name: entry.display_name(),
                });
                job.succeed(entry)
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Download failed");
                self.emit(DownloadEvent::Failed {
                    job_id: job_id.to_string(),
                    url: job.url.clone(),
                    message: e.to_string(),
                });
                job.fail(e.to_string())
            }
        };

        match finished {
            Ok(job) => self.deliver(job),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job finished in an invalid state");
                let registry = self.registry.lock();
                registry.borrow_mut().jobs.remove(&job_id);
            }
        }
    }

    /// Download into a private temporary directory and ingest the result.
    /// The directory and the plaintext in it are removed on every path.
    fn download_and_ingest(&self, url: &str, cookies: &[DownloadCookie]) -> Result<VaultEntry> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("vault-download-");
        let workdir = match &self.temp_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        let file = self.downloader.download(url, cookies, workdir.path())?;
        if !file.starts_with(workdir.path()) {
            return Err(BridgeError::DownloadFailed(
                "downloader wrote outside its destination directory".to_string(),
            )
            .into());
        }

        let entry = self.runtime.block_on(self.pipeline.ingest(&file))?;
        Ok(entry)
    }

    fn deliver(self: &Arc<Self>, job: DownloadJob) {
        let job_id = job.id;
        let shared = Arc::clone(self);
        let task: UiTask = Box::new(move || shared.complete(job));

        if let Err(e) = self.dispatcher.dispatch(task) {
            warn!(job_id = %job_id, error = %e, "UI loop gone; discarding download outcome");
            let registry = self.registry.lock();
            registry.borrow_mut().jobs.remove(&job_id);
        }
    }

    /// Runs on the UI thread.
    fn complete(&self, job: DownloadJob) {
        let registry = self.registry.lock();
        registry.borrow_mut().jobs.remove(&job.id);
        let handler = registry.borrow().handler.clone();

        match handler {
            Some(handler) => handler(&job),
            None => match &job.outcome {
                Some(JobOutcome::Succeeded { entry }) => {
                    info!(job_id = %job.id, display_name = %entry.display_name(), "Download completed")
                }
                Some(JobOutcome::Failed { error }) => {
                    info!(job_id = %job.id, error = %error, "Download completed with failure")
                }
                None => {}
            },
        }
        drop(registry);
    }
}
