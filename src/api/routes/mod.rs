//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Job submission and status
//! - [`system`] - Health, events, OpenAPI document

use crate::types::JobId;
use serde::{Deserialize, Serialize};

mod jobs;
mod system;

pub use jobs::*;
pub use system::*;

/// Request body for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadRequest {
    /// Media page URL (http or https)
    #[serde(default)]
    pub url: Option<String>,
}

/// Response body for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    /// Identifier to poll with GET /status/{jobId}
    pub job_id: JobId,
}

/// Response body for GET /health
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// Always "ok" when the server responds
    pub status: String,
    /// Crate version
    pub version: String,
    /// Jobs not yet in a terminal status
    pub active_jobs: usize,
    /// Whether submissions are accepted
    pub accepting_jobs: bool,
}
