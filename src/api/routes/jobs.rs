//! Job handlers: submit, status.

use super::{DownloadRequest, DownloadResponse};
use crate::api::AppState;
use crate::error::{ApiError, Error};
use crate::types::JobId;
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /download - Submit a URL
#[utoipa::path(
    post,
    path = "/download",
    tag = "jobs",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Job accepted", body = DownloadResponse),
        (status = 400, description = "Missing or invalid url", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 503, description = "Service is shutting down", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn submit_download(
    State(state): State<AppState>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Response {
    let url = match body {
        Ok(Json(DownloadRequest { url: Some(url) })) if !url.trim().is_empty() => url,
        Ok(_) => return missing_url(),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected download request body");
            return missing_url();
        }
    };

    match state.service.submit(&url).await {
        Ok(job_id) => (StatusCode::OK, Json(DownloadResponse { job_id })).into_response(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Submission rejected");
            e.into_response()
        }
    }
}

/// GET /status/:jobId - Current job snapshot
#[utoipa::path(
    get,
    path = "/status/{jobId}",
    tag = "jobs",
    params(
        ("jobId" = String, Path, description = "Job ID returned by POST /download")
    ),
    responses(
        (status = 200, description = "Job snapshot", body = crate::types::JobInfo),
        (status = 401, description = "Missing or invalid API key", body = crate::error::ApiError),
        (status = 404, description = "Job not found", body = crate::error::ApiError)
    ),
    security(("api_key" = []))
)]
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<String>) -> Response {
    // Malformed IDs cannot name a job, so they are simply not found
    let Ok(id) = job_id.parse::<JobId>() else {
        return Error::NotFound(job_id).into_response();
    };

    match state.service.status(id).await {
        Some(info) => (StatusCode::OK, Json(info)).into_response(),
        None => Error::NotFound(id.to_string()).into_response(),
    }
}

fn missing_url() -> Response {
    ApiError::new("missing_url", "url is required").with_status(StatusCode::BAD_REQUEST)
}
