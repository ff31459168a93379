//! Job service façade: submission, status, and events
//!
//! - [`lifecycle`] - Graceful shutdown

mod lifecycle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{CliFetchRunner, FetchRunner};
use crate::job::{JobOrchestrator, JobStore};
use crate::proxy::ProxyPool;
use crate::types::{Event, JobId, JobInfo};
use crate::upload::{ObjectStoreUploader, Uploader};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Job scheduling state
#[derive(Clone)]
pub(crate) struct JobSlots {
    /// Limits jobs fetching or uploading at once (respects `max_concurrent_jobs`)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Running jobs and their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Parent of every job token; cancelled on shutdown
    pub(crate) root_token: CancellationToken,
    /// Whether new jobs are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
}

/// Main service instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct JobService {
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Job records
    pub(crate) store: Arc<JobStore>,
    /// Shared retry/upload driver
    pub(crate) orchestrator: Arc<JobOrchestrator>,
    /// Scheduling state
    pub(crate) slots: JobSlots,
}

impl JobService {
    /// Create a service backed by yt-dlp and S3
    ///
    /// Validates the configuration, resolves the yt-dlp binary, and builds the S3
    /// client.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let fetcher = CliFetchRunner::from_config(&config.fetch)?;
        tracing::info!(binary = %fetcher.binary_path().display(), "Using yt-dlp");
        let uploader = ObjectStoreUploader::from_config(&config.storage)?;
        Self::with_components(config, Arc::new(fetcher), Arc::new(uploader)).await
    }

    /// Create a service with custom fetch and upload backends
    pub async fn with_components(
        config: Config,
        fetcher: Arc<dyn FetchRunner>,
        uploader: Arc<dyn Uploader>,
    ) -> Result<Self> {
        let proxies = Arc::new(ProxyPool::from_config(&config.proxy)?);

        tokio::fs::create_dir_all(&config.fetch.download_dir)
            .await
            .map_err(|e| Error::Config {
                message: format!(
                    "failed to create download directory '{}': {}",
                    config.fetch.download_dir.display(),
                    e
                ),
                key: Some("fetch.download_dir".into()),
            })?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::new(JobStore::new(event_tx.clone()));
        let orchestrator = Arc::new(JobOrchestrator::new(
            proxies.clone(),
            fetcher.clone(),
            uploader,
            config.retry.clone(),
            &config.fetch,
        ));
        let slots = JobSlots {
            concurrent_limit: Arc::new(Semaphore::new(config.jobs.max_concurrent_jobs.max(1))),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            root_token: CancellationToken::new(),
            accepting_new: Arc::new(AtomicBool::new(true)),
        };

        tracing::info!(
            fetcher = fetcher.name(),
            proxies = proxies.len(),
            max_concurrent_jobs = config.jobs.max_concurrent_jobs,
            max_retries = config.retry.max_retries,
            "Job service ready"
        );

        Ok(Self {
            event_tx,
            config: Arc::new(config),
            store,
            orchestrator,
            slots,
        })
    }

    /// Accept a URL and start its job in the background
    ///
    /// The job record exists and is readable by [`status`](Self::status) before
    /// this returns. The job waits in `pending` until a slot frees up.
    pub async fn submit(&self, url: &str) -> Result<JobId> {
        if !self.slots.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        let url = validate_url(url)?;

        let (id, handle) = self.store.create(url.clone()).await;
        let token = self.slots.root_token.child_token();
        self.slots.active_jobs.lock().await.insert(id, token.clone());

        tracing::info!(job_id = %id, url = %url, "Job submitted");

        let service = self.clone();
        tokio::spawn(async move {
            let active = ActiveJobGuard {
                id,
                active_jobs: Arc::clone(&service.slots.active_jobs),
            };
            let permit = tokio::select! {
                permit = service.slots.concurrent_limit.clone().acquire_owned() => permit.ok(),
                _ = token.cancelled() => None,
            };

            // Without a permit the token is already cancelled and the job ends at once.
            let info = service.orchestrator.run(handle, token).await;
            drop(permit);
            drop(active);

            tracing::debug!(job_id = %id, status = %info.status, "Job task finished");
        });

        Ok(id)
    }

    /// Current snapshot of a job, or `None` if the ID is unknown
    pub async fn status(&self, id: JobId) -> Option<JobInfo> {
        self.store.get(id).await
    }

    /// Subscribe to job events
    ///
    /// Slow subscribers may miss events (`RecvError::Lagged`).
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// IDs of jobs that have not reached a terminal status yet
    pub async fn active_jobs(&self) -> Vec<JobId> {
        self.slots.active_jobs.lock().await.keys().copied().collect()
    }

    /// Number of jobs accepted since startup
    pub async fn job_count(&self) -> usize {
        self.store.len().await
    }

    /// Configuration the service was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.slots.accepting_new.load(Ordering::SeqCst)
    }

    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

/// Removes a job from `active_jobs` when its task ends, including by panic
struct ActiveJobGuard {
    id: JobId,
    active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        if let Ok(mut jobs) = self.active_jobs.try_lock() {
            jobs.remove(&self.id);
            return;
        }
        let id = self.id;
        let active_jobs = Arc::clone(&self.active_jobs);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    active_jobs.lock().await.remove(&id);
                });
            }
            Err(_) => tracing::warn!(job_id = %id, "Could not release active job slot"),
        }
    }
}

/// Accept only absolute http(s) URLs
fn validate_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| Error::InvalidUrl(format!("'{}': {}", trimmed, e)))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(trimmed.to_string()),
        scheme => Err(Error::InvalidUrl(format!(
            "'{}': unsupported scheme '{}'",
            trimmed, scheme
        ))),
    }
}
