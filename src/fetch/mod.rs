//! Single-attempt media fetching
//!
//! This module provides a trait-based seam around the external fetch tool. One call
//! to [`FetchRunner::run`] performs exactly one attempt through one proxy; retries
//! and proxy rotation belong to the job orchestrator.
//!
//! - [`CliFetchRunner`]: runs the `yt-dlp` binary as a subprocess
//! - [`parse_progress_line`]: extracts percentages from the tool's `--newline` output
//! - [`find_artifact`]: locates a job's output file in the shared download directory

mod cli;
mod progress;
mod traits;

pub use cli::CliFetchRunner;
pub use progress::parse_progress_line;
pub use traits::FetchRunner;

use crate::types::JobId;
use std::path::{Path, PathBuf};

/// Inputs for one fetch attempt
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Job the attempt belongs to; names the output file
    pub job_id: JobId,
    /// Source URL
    pub url: String,
    /// Proxy URL, credentials included
    pub proxy_url: String,
    /// Shared download directory
    pub output_dir: PathBuf,
}

impl FetchRequest {
    /// Output path template handed to the tool: `<dir>/<jobId>.%(ext)s`
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(format!("{}.%(ext)s", self.job_id))
    }
}

/// Find the finished output file for a job
///
/// Returns the first regular file (by name) whose name starts with `<jobId>.`,
/// skipping partial downloads the tool leaves behind.
pub async fn find_artifact(dir: &Path, job_id: JobId) -> std::io::Result<Option<PathBuf>> {
    let prefix = format!("{job_id}.");
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(&prefix) || name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            candidates.push(entry.path());
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}
