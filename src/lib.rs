//! # yloader
//!
//! Media fetch service: accepts a media URL, downloads it with `yt-dlp` through
//! a pool of rotating proxies, and streams the result into S3-compatible object
//! storage.
//!
//! Each submission becomes a job with a unique id. Jobs move through
//! `pending -> downloading -> uploading -> completed`, or end in `error` once
//! every attempt is exhausted or the upload fails. Clients poll job status over
//! the REST API or subscribe to the event stream.
//!
//! ## Quick Start
//!
//! ```no_run
//! use yloader::{Config, JobService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let service = JobService::new(config).await?;
//!
//!     let mut events = service.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let job_id = service.submit("https://video.example.com/watch?v=abc").await?;
//!     println!("submitted {job_id}");
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Media fetching through the external downloader
pub mod fetch;
/// Job records, registry and per-job pipeline
pub mod job;
/// Rotating proxy pool
pub mod proxy;
/// Linear backoff between fetch attempts
pub mod retry;
/// Job service: submission, concurrency and shutdown
pub mod service;
/// Core types and events
pub mod types;
/// Object storage uploads
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use error::{ApiError, Error, ErrorDetail, FetchError, Result, ToHttpStatus, UploadError};
pub use fetch::{CliFetchRunner, FetchRequest, FetchRunner};
pub use proxy::{ProxyEndpoint, ProxyPool};
pub use service::JobService;
pub use types::{Event, JobId, JobInfo, JobStatus};
pub use upload::{ObjectStoreUploader, Uploader};

/// Helper function to run the service with graceful signal handling.
///
/// Waits for a termination signal and then calls the service's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use yloader::{Config, JobService, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = JobService::new(Config::from_env()?).await?;
///     run_with_shutdown(service).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(service: JobService) -> Result<()> {
    wait_for_signal().await;
    service.shutdown().await
}

/// Resolves when the process receives a termination signal
pub async fn shutdown_signal() {
    wait_for_signal().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
