//! Trait for fetch backends

use super::FetchRequest;
use crate::error::FetchError;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Trait for a single fetch attempt
///
/// Implementations run the fetch once through the proxy named in the request and
/// resolve to the path of the finished artifact. They never retry.
///
/// Progress percentages (0.0 to 100.0) are pushed into `progress` with
/// `try_send`; updates may be dropped when the receiver falls behind.
#[async_trait]
pub trait FetchRunner: Send + Sync {
    /// Perform one attempt
    ///
    /// # Errors
    ///
    /// - [`FetchError::ToolFailure`] when the tool cannot be spawned, exits non-zero,
    ///   or its output stream breaks
    /// - [`FetchError::OutputMissing`] when the tool succeeds but no artifact exists
    async fn run(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f32>,
    ) -> Result<PathBuf, FetchError>;

    /// Name of this implementation, for logs
    fn name(&self) -> &'static str;
}
