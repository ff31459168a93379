//! CLI-based fetch runner using the external yt-dlp binary

use super::progress::parse_progress_line;
use super::traits::FetchRunner;
use super::{FetchRequest, find_artifact};
use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Number of trailing stderr lines kept for failure details
const STDERR_TAIL_LINES: usize = 20;

/// Fetch runner that executes `yt-dlp`
///
/// The child process is killed if the attempt future is dropped, so a timed out
/// or cancelled attempt never leaves a stray download running.
pub struct CliFetchRunner {
    binary_path: PathBuf,
    config: FetchConfig,
}

impl CliFetchRunner {
    /// Create a runner with an explicit binary path
    pub fn new(binary_path: PathBuf, config: FetchConfig) -> Self {
        Self {
            binary_path,
            config,
        }
    }

    /// Create a runner from configuration
    ///
    /// Uses `binary_path` when set, otherwise searches PATH for `yt-dlp` if
    /// `search_path` allows it.
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let binary_path = match &config.binary_path {
            Some(path) => path.clone(),
            None if config.search_path => which::which("yt-dlp").map_err(|e| {
                Error::ExternalTool(format!("yt-dlp not found in PATH: {}", e))
            })?,
            None => {
                return Err(Error::ExternalTool(
                    "no yt-dlp binary configured and PATH search is disabled".into(),
                ));
            }
        };
        Ok(Self::new(binary_path, config.clone()))
    }

    /// Path of the binary this runner executes
    pub fn binary_path(&self) -> &std::path::Path {
        &self.binary_path
    }

    /// Command-line arguments for one attempt
    pub fn build_args(&self, request: &FetchRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            request.url.clone().into(),
            "--proxy".into(),
            request.proxy_url.clone().into(),
            "-o".into(),
            request.output_template().into_os_string(),
            "--no-playlist".into(),
            "--newline".into(),
            "-f".into(),
            self.config.format.clone().into(),
            "--merge-output-format".into(),
            self.config.merge_output_format.clone().into(),
        ];

        if let Some(ffmpeg) = &self.config.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone().into_os_string());
        }
        if let Some(plugins) = &self.config.plugin_dirs {
            args.push("--plugin-dirs".into());
            args.push(plugins.clone().into_os_string());
        }
        for extractor_args in &self.config.extractor_args {
            args.push("--extractor-args".into());
            args.push(extractor_args.clone().into());
        }
        // Attached only when present; a stale path must not break every attempt.
        if let Some(cookies) = self.config.cookies_file.as_ref().filter(|p| p.is_file()) {
            args.push("--cookies".into());
            args.push(cookies.clone().into_os_string());
        }

        args
    }
}

#[async_trait]
impl FetchRunner for CliFetchRunner {
    async fn run(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f32>,
    ) -> std::result::Result<PathBuf, FetchError> {
        let mut child = Command::new(&self.binary_path)
            .args(self.build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::ToolFailure {
                detail: format!("failed to execute {}: {}", self.binary_path.display(), e),
            })?;

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                return Err(FetchError::ToolFailure {
                    detail: "child process output was not captured".into(),
                });
            }
        };

        let (stdout_result, stderr_tail) =
            tokio::join!(forward_progress(stdout, &progress), read_tail(stderr));

        if let Err(e) = stdout_result {
            return Err(FetchError::ToolFailure {
                detail: format!("failed to read tool output: {}", e),
            });
        }

        let status = child.wait().await.map_err(|e| FetchError::ToolFailure {
            detail: format!("failed to wait for tool: {}", e),
        })?;

        if !status.success() {
            let tail = Vec::from(stderr_tail).join("\n");
            return Err(FetchError::ToolFailure {
                detail: if tail.is_empty() {
                    format!("yt-dlp {}", status)
                } else {
                    format!("yt-dlp {}: {}", status, tail)
                },
            });
        }

        match find_artifact(&request.output_dir, request.job_id).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => Err(FetchError::OutputMissing {
                dir: request.output_dir.clone(),
            }),
            Err(e) => Err(FetchError::ToolFailure {
                detail: format!(
                    "failed to scan {}: {}",
                    request.output_dir.display(),
                    e
                ),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "cli-yt-dlp"
    }
}

async fn forward_progress<R>(reader: R, progress: &mpsc::Sender<f32>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).split(b'\n');
    while let Some(raw) = lines.next_segment().await? {
        if let Some(percent) = parse_progress_line(&String::from_utf8_lossy(&raw)) {
            // Lossy: the orchestrator only needs the latest value.
            let _ = progress.try_send(percent);
        }
    }
    Ok(())
}

/// Keep the last lines of `reader`, draining it to EOF
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the read, so
/// the child never sees a closed pipe.
async fn read_tail<R>(reader: R) -> VecDeque<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(reader).split(b'\n');
    loop {
        let raw = match lines.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading tool stderr");
                break;
            }
        };
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }
    tail
}
