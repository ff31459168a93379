//! Retry loop, upload hand-off, and cleanup for one job

use super::record::JobHandle;
use crate::config::{FetchConfig, RetryConfig};
use crate::error::{Error, FetchError, UploadError};
use crate::fetch::{FetchRequest, FetchRunner};
use crate::proxy::{EndpointId, ProxyPool};
use crate::retry::wait_before_attempt;
use crate::types::{JobInfo, JobStatus};
use crate::upload::{Uploader, object_key_for};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Buffered progress updates per attempt; older updates are dropped when full
const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Failure message recorded for a cancelled job
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Drives one job from `pending` to a terminal status
///
/// Fetch attempts run strictly one after another, each through a different proxy
/// than the one before, separated by linear backoff. The first successful
/// artifact is uploaded exactly once.
pub struct JobOrchestrator {
    proxies: Arc<ProxyPool>,
    fetcher: Arc<dyn FetchRunner>,
    uploader: Arc<dyn Uploader>,
    retry: RetryConfig,
    download_dir: PathBuf,
    attempt_timeout: Option<Duration>,
}

/// Why the fetch phase ended without an artifact
enum FetchOutcome {
    Exhausted,
    Cancelled,
}

impl JobOrchestrator {
    /// Create an orchestrator over the given collaborators
    pub fn new(
        proxies: Arc<ProxyPool>,
        fetcher: Arc<dyn FetchRunner>,
        uploader: Arc<dyn Uploader>,
        retry: RetryConfig,
        fetch: &FetchConfig,
    ) -> Self {
        Self {
            proxies,
            fetcher,
            uploader,
            retry,
            download_dir: fetch.download_dir.clone(),
            attempt_timeout: fetch.attempt_timeout,
        }
    }

    /// Run the job to completion and return its final snapshot
    ///
    /// Never returns an error: every outcome is recorded on the job itself.
    pub async fn run(&self, handle: JobHandle, cancel: CancellationToken) -> JobInfo {
        let job_id = handle.id();

        if let Err(e) = handle.transition(JobStatus::Downloading) {
            tracing::error!(job_id = %job_id, error = %e, "Job could not start");
            return handle.snapshot();
        }

        let artifact = match self.fetch_with_retries(&handle, &cancel).await {
            Ok(path) => path,
            Err(outcome) => {
                let message = match outcome {
                    FetchOutcome::Exhausted => Error::ExhaustedRetries.to_string(),
                    FetchOutcome::Cancelled => CANCELLED_MESSAGE.to_string(),
                };
                tracing::error!(job_id = %job_id, error = %message, "Job failed");
                finish(handle.fail(message), &handle);
                return handle.snapshot();
            }
        };

        handle.set_artifact(&artifact);
        handle.set_progress(100.0);
        if let Err(e) = handle.transition(JobStatus::Uploading) {
            tracing::error!(job_id = %job_id, error = %e, "Job could not enter upload");
            return handle.snapshot();
        }

        let upload = match object_key_for(&artifact) {
            Ok(key) => {
                tracing::info!(job_id = %job_id, key = %key, "Uploading artifact");
                self.upload(&artifact, key).await
            }
            Err(e) => Err(e),
        };

        match upload {
            Ok(location) => {
                remove_artifact(&handle, &artifact).await;
                tracing::info!(job_id = %job_id, location = %location, "Job completed");
                finish(handle.complete(location), &handle);
            }
            Err(e) => {
                // The artifact stays on disk for inspection.
                tracing::error!(
                    job_id = %job_id,
                    artifact = %artifact.display(),
                    error = %e,
                    "Upload failed"
                );
                finish(handle.fail(e.detail), &handle);
            }
        }

        handle.snapshot()
    }

    async fn fetch_with_retries(
        &self,
        handle: &JobHandle,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchOutcome> {
        let job_id = handle.id();
        let url = handle.url();
        let total_attempts = self.retry.total_attempts();
        let mut previous: Option<EndpointId> = None;

        for attempt in 0..total_attempts {
            if wait_before_attempt(&self.retry, attempt, cancel).await.is_err() {
                return Err(FetchOutcome::Cancelled);
            }

            let proxy = self.proxies.select(previous);
            previous = Some(proxy.id);
            handle.begin_attempt();

            tracing::info!(
                job_id = %job_id,
                attempt,
                total_attempts,
                proxy = %proxy.redacted(),
                "Starting fetch attempt"
            );

            let request = FetchRequest {
                job_id,
                url: url.clone(),
                proxy_url: proxy.url(),
                output_dir: self.download_dir.clone(),
            };

            match self.attempt(handle, &request, cancel).await {
                Ok(path) => {
                    tracing::info!(
                        job_id = %job_id,
                        attempt,
                        artifact = %path.display(),
                        "Fetch attempt succeeded"
                    );
                    return Ok(path);
                }
                Err(FetchError::Cancelled) => return Err(FetchOutcome::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt,
                        proxy = %proxy.redacted(),
                        error = %e,
                        "Fetch attempt failed"
                    );
                    handle.report_attempt_failure(attempt, proxy.redacted(), e.to_string());
                }
            }
        }

        Err(FetchOutcome::Exhausted)
    }

    /// One fetch with progress forwarding, deadline, and cancellation
    ///
    /// The runner executes in its own task, so a panicking runner fails only
    /// this attempt.
    async fn attempt(
        &self,
        handle: &JobHandle,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, FetchError> {
        let (tx, mut rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);

        let fetcher = Arc::clone(&self.fetcher);
        let owned = request.clone();
        let mut task = tokio::spawn(async move { fetcher.run(&owned, tx).await });

        let fetch = async {
            let deadline = async {
                match self.attempt_timeout {
                    Some(after) => {
                        tokio::time::sleep(after).await;
                        after
                    }
                    None => std::future::pending().await,
                }
            };
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                after = deadline => Err(FetchError::TimedOut { after }),
                joined = &mut task => joined.unwrap_or_else(|e| {
                    Err(FetchError::ToolFailure {
                        detail: join_failure("fetch runner", e),
                    })
                }),
            };
            // Dropping the runner future kills any child process it started.
            task.abort();
            result
        };

        // Ends once the runner task drops its sender.
        let drain = async {
            while let Some(percent) = rx.recv().await {
                handle.set_progress(percent);
            }
        };

        let (result, ()) = tokio::join!(fetch, drain);
        result
    }

    /// Upload in a separate task so a panicking uploader fails only the upload
    async fn upload(&self, artifact: &Path, key: String) -> Result<String, UploadError> {
        let uploader = Arc::clone(&self.uploader);
        let path = artifact.to_path_buf();
        tokio::spawn(async move { uploader.upload(&path, &key).await })
            .await
            .unwrap_or_else(|e| Err(UploadError::new(join_failure("uploader", e))))
    }
}

/// Failure detail for a collaborator task that did not return
fn join_failure(what: &str, err: JoinError) -> String {
    if !err.is_panic() {
        return format!("{what} task was cancelled");
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match message {
        Some(message) => format!("{what} panicked: {message}"),
        None => format!("{what} panicked"),
    }
}

async fn remove_artifact(handle: &JobHandle, artifact: &Path) {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => {
            handle.clear_artifact();
            tracing::debug!(job_id = %handle.id(), artifact = %artifact.display(), "Removed local artifact");
        }
        Err(e) => tracing::warn!(
            job_id = %handle.id(),
            artifact = %artifact.display(),
            error = %e,
            "Failed to remove local artifact"
        ),
    }
}

fn finish(result: crate::error::Result<()>, handle: &JobHandle) {
    if let Err(e) = result {
        tracing::error!(job_id = %handle.id(), error = %e, "Job record rejected terminal update");
    }
}
