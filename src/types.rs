//! Core types for yloader

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a job
///
/// Generated at submission and immutable for the life of the job. Also used as the
/// file name stem of the job's local artifact, so concurrent jobs never share an
/// output path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Job status
///
/// Jobs move forward only:
/// `pending -> downloading -> uploading -> completed`, with `downloading -> error`
/// and `uploading -> error`. `completed` and `error` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker slot
    Pending,
    /// Fetch attempts in progress
    Downloading,
    /// Artifact is being transferred to object storage
    Uploading,
    /// Stored durably; `result_location` is set
    Completed,
    /// Failed; `error` is set
    Error,
}

impl JobStatus {
    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Downloading)
                | (JobStatus::Downloading, JobStatus::Uploading)
                | (JobStatus::Downloading, JobStatus::Error)
                | (JobStatus::Uploading, JobStatus::Completed)
                | (JobStatus::Uploading, JobStatus::Error)
        )
    }

    /// Terminal statuses never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Lowercase name as used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Uploading => "uploading",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a job, as returned by status queries
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobInfo {
    /// Job ID
    pub id: JobId,
    /// Source URL as submitted
    pub url: String,
    /// Current status
    pub status: JobStatus,
    /// Fetch progress of the current attempt (0.0 to 100.0); meaningful while downloading
    pub progress: f32,
    /// Durable storage location, set once the job completes
    pub result_location: Option<String>,
    /// Failure message, set once the job errors
    pub error: Option<String>,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

/// Event emitted while jobs progress
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted
    Queued {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },

    /// Job moved to a new status
    StatusChanged {
        /// Job ID
        id: JobId,
        /// Previous status
        from: JobStatus,
        /// New status
        to: JobStatus,
    },

    /// Fetch progress update
    Progress {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// One fetch attempt failed; the orchestrator may retry
    AttemptFailed {
        /// Job ID
        id: JobId,
        /// Zero-based attempt index
        attempt: u32,
        /// Proxy used for the attempt (credentials redacted)
        proxy: String,
        /// Failure message
        error: String,
    },

    /// Job stored durably
    Completed {
        /// Job ID
        id: JobId,
        /// Durable storage location
        location: String,
    },

    /// Job failed terminally
    Failed {
        /// Job ID
        id: JobId,
        /// Failure message
        error: String,
    },

    /// Service is shutting down
    Shutdown,
}

impl Event {
    /// Short name used as the SSE event type
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::StatusChanged { .. } => "status_changed",
            Event::Progress { .. } => "progress",
            Event::AttemptFailed { .. } => "attempt_failed",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Shutdown => "shutdown",
        }
    }
}
