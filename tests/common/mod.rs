//! Common test utilities for yloader integration tests

#[allow(dead_code)]
pub mod backends;

#[allow(unused_imports)]
pub use backends::*;

use std::path::Path;
use std::time::Duration;
use yloader::config::ProxyConfig;
use yloader::{Config, Event, JobId, JobInfo, JobService};

/// Result of waiting for a job to finish
#[derive(Debug, PartialEq)]
#[allow(dead_code)]
pub enum WaitResult {
    /// Job completed with this storage location
    Completed(String),
    /// Job failed with this message
    Failed(String),
    /// Timeout waiting for a terminal status
    Timeout,
}

/// Config with a three-port proxy pool and millisecond backoff
#[allow(dead_code)]
pub fn test_config(dir: &Path, max_concurrent_jobs: usize) -> Config {
    let mut config = Config::default();
    config.fetch.download_dir = dir.join("downloads");
    config.proxy = ProxyConfig {
        host: "proxy.example.net".into(),
        ports: vec![10001, 10002, 10003],
        username: Some("tester".into()),
        password: Some("not-a-real-secret".into()),
        ..ProxyConfig::default()
    };
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.delay_increment = Duration::from_millis(1);
    config.jobs.max_concurrent_jobs = max_concurrent_jobs;
    config
}

/// Poll job status until it is terminal
#[allow(dead_code)]
pub async fn wait_for_terminal(service: &JobService, id: JobId, timeout: Duration) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            if let Some(info) = service.status(id).await {
                if let Some(done) = terminal_result(&info) {
                    return done;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

fn terminal_result(info: &JobInfo) -> Option<WaitResult> {
    if !info.status.is_terminal() {
        return None;
    }
    match (&info.result_location, &info.error) {
        (Some(location), _) => Some(WaitResult::Completed(location.clone())),
        (None, Some(error)) => Some(WaitResult::Failed(error.clone())),
        (None, None) => Some(WaitResult::Failed(String::new())),
    }
}

/// Collect events for one job until it completes or fails
#[allow(dead_code)]
pub async fn collect_job_events(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> Vec<Event> {
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            if event_job(&event) != Some(id) {
                continue;
            }
            let done = matches!(event, Event::Completed { .. } | Event::Failed { .. });
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;

    collected
}

/// Job an event refers to, if any
pub fn event_job(event: &Event) -> Option<JobId> {
    match event {
        Event::Queued { id, .. }
        | Event::StatusChanged { id, .. }
        | Event::Progress { id, .. }
        | Event::AttemptFailed { id, .. }
        | Event::Completed { id, .. }
        | Event::Failed { id, .. } => Some(*id),
        Event::Shutdown => None,
    }
}
