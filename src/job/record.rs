//! Per-job record and its single writer

use crate::error::{Error, Result};
use crate::types::{Event, JobId, JobInfo, JobStatus};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, watch};

/// Full state of one job, including internal fields not exposed by status queries
#[derive(Clone, Debug, PartialEq)]
pub struct JobRecord {
    /// Job ID
    pub id: JobId,
    /// Source URL
    pub url: String,
    /// Current status
    pub status: JobStatus,
    /// Progress of the current fetch attempt (0.0 to 100.0)
    pub progress: f32,
    /// Durable location, set once on completion
    pub result_location: Option<String>,
    /// Failure message, set once on error
    pub error: Option<String>,
    /// Local artifact, set after a successful fetch and cleared after cleanup
    pub local_artifact_path: Option<PathBuf>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh pending record
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            url: url.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            result_location: None,
            error: None,
            local_artifact_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Public view of the record
    pub fn info(&self) -> JobInfo {
        JobInfo {
            id: self.id,
            url: self.url.clone(),
            status: self.status,
            progress: self.progress,
            result_location: self.result_location.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Exclusive write access to one job's record
///
/// Exactly one handle exists per job and it is not `Clone`; whoever holds it is
/// the only writer. Readers observe the record through the
/// [`JobStore`](super::JobStore), and every update replaces the whole record at
/// once so a reader never sees a half-applied change.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    record: watch::Sender<JobRecord>,
    events: broadcast::Sender<Event>,
}

impl JobHandle {
    pub(super) fn new(
        id: JobId,
        record: watch::Sender<JobRecord>,
        events: broadcast::Sender<Event>,
    ) -> Self {
        Self { id, record, events }
    }

    /// Job ID
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Source URL
    pub fn url(&self) -> String {
        self.record.borrow().url.clone()
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.record.borrow().status
    }

    /// Copy of the full record
    pub fn record(&self) -> JobRecord {
        self.record.borrow().clone()
    }

    /// Public snapshot of the record
    pub fn snapshot(&self) -> JobInfo {
        self.record.borrow().info()
    }

    /// Move to a non-terminal status
    ///
    /// Terminal statuses are reached only through [`complete`](Self::complete)
    /// and [`fail`](Self::fail), which set the outcome in the same update.
    pub fn transition(&self, to: JobStatus) -> Result<()> {
        if to.is_terminal() {
            return Err(Error::InvalidTransition {
                from: self.status(),
                to,
            });
        }
        let from = self.apply_transition(to, |_| {})?;
        self.emit(Event::StatusChanged {
            id: self.id,
            from,
            to,
        });
        Ok(())
    }

    /// Reset progress for a new fetch attempt
    pub fn begin_attempt(&self) {
        self.record.send_if_modified(|record| {
            if record.progress == 0.0 {
                return false;
            }
            record.progress = 0.0;
            record.updated_at = Utc::now();
            true
        });
    }

    /// Record fetch progress
    ///
    /// Values are clamped to 0..=100. Within an attempt progress never decreases,
    /// so stale or out-of-order updates are dropped. Ignored unless downloading.
    pub fn set_progress(&self, percent: f32) {
        if percent.is_nan() {
            return;
        }
        let percent = percent.clamp(0.0, 100.0);
        let changed = self.record.send_if_modified(|record| {
            if record.status != JobStatus::Downloading || percent <= record.progress {
                return false;
            }
            record.progress = percent;
            record.updated_at = Utc::now();
            true
        });
        if changed {
            self.emit(Event::Progress {
                id: self.id,
                percent,
            });
        }
    }

    /// Record the local artifact produced by a successful fetch
    pub fn set_artifact(&self, path: &Path) {
        self.record.send_modify(|record| {
            record.local_artifact_path = Some(path.to_path_buf());
            record.updated_at = Utc::now();
        });
    }

    /// Forget the local artifact once it has been removed
    pub fn clear_artifact(&self) {
        self.record.send_modify(|record| {
            record.local_artifact_path = None;
            record.updated_at = Utc::now();
        });
    }

    /// Announce a failed fetch attempt
    pub fn report_attempt_failure(&self, attempt: u32, proxy: String, error: String) {
        self.emit(Event::AttemptFailed {
            id: self.id,
            attempt,
            proxy,
            error,
        });
    }

    /// Finish successfully: status `completed` and the location in one update
    pub fn complete(&self, location: impl Into<String>) -> Result<()> {
        let location = location.into();
        let stored = location.clone();
        let from = self.apply_transition(JobStatus::Completed, move |record| {
            record.result_location = Some(stored);
            record.error = None;
        })?;
        self.emit(Event::StatusChanged {
            id: self.id,
            from,
            to: JobStatus::Completed,
        });
        self.emit(Event::Completed {
            id: self.id,
            location,
        });
        Ok(())
    }

    /// Finish with a failure: status `error` and the message in one update
    pub fn fail(&self, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        let stored = message.clone();
        let from = self.apply_transition(JobStatus::Error, move |record| {
            record.error = Some(stored);
            record.result_location = None;
        })?;
        self.emit(Event::StatusChanged {
            id: self.id,
            from,
            to: JobStatus::Error,
        });
        self.emit(Event::Failed {
            id: self.id,
            error: message,
        });
        Ok(())
    }

    fn apply_transition<F>(&self, to: JobStatus, update: F) -> Result<JobStatus>
    where
        F: FnOnce(&mut JobRecord),
    {
        let mut outcome = Ok(JobStatus::Pending);
        let mut update = Some(update);
        self.record.send_if_modified(|record| {
            let from = record.status;
            if !from.can_transition_to(to) {
                outcome = Err(Error::InvalidTransition { from, to });
                return false;
            }
            record.status = to;
            record.updated_at = Utc::now();
            if let Some(update) = update.take() {
                update(record);
            }
            outcome = Ok(from);
            true
        });
        outcome
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        self.events.send(event).ok();
    }
}
