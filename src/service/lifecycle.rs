//! Shutdown coordination.

use crate::error::Result;
use crate::types::Event;
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::JobService;

/// How long shutdown waits for job tasks to finish
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

impl JobService {
    /// Gracefully shut down the service
    ///
    /// 1. Stops accepting new jobs
    /// 2. Cancels every active job (each ends in `error` with "cancelled")
    /// 3. Waits up to 30 seconds for job tasks to finish
    /// 4. Emits [`Event::Shutdown`]
    ///
    /// Artifacts of interrupted jobs are left in the download directory.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.slots.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        self.cancel_all().await;

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active jobs finished"),
            Err(_) => tracing::warn!("Timeout waiting for jobs to finish, proceeding with shutdown"),
        }

        self.emit_event(Event::Shutdown);
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Signal cancellation to every active job
    pub(crate) async fn cancel_all(&self) {
        let active = self.slots.active_jobs.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling active jobs");
        for (id, token) in active.iter() {
            tracing::debug!(job_id = %id, "Signaling cancellation");
            token.cancel();
        }
        // Also covers jobs whose task has not registered yet
        self.slots.root_token.cancel();
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.slots.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }
            tracing::debug!(active_count, "Waiting for active jobs to finish");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
