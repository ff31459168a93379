//! Streaming transfer of finished artifacts into object storage
//!
//! [`Uploader`] is the seam the orchestrator calls once per job.
//! [`ObjectStoreUploader`] implements it with bounded-memory multipart puts.

mod store;

pub use store::ObjectStoreUploader;

use crate::error::UploadError;
use async_trait::async_trait;
use std::path::Path;

/// Trait for durable storage of a local artifact
///
/// Implementations stream the file rather than loading it whole and never retry;
/// a failed upload is terminal for the job.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload `local_path` under `key` and return its durable location
    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, UploadError>;
}

/// Fully-qualified location of an uploaded object
///
/// With a custom endpoint: `<endpoint>/<bucket>/<key>`. Without one, the AWS
/// virtual-hosted form `https://<bucket>.s3.<region>.amazonaws.com/<key>`.
pub fn public_location(endpoint: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

/// Storage key for an artifact: its file name, `<jobId>.<ext>`
pub fn object_key_for(path: &Path) -> Result<String, UploadError> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| UploadError::new(format!("artifact path has no file name: {}", path.display())))
}
