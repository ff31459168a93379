//! Configuration types for yloader

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, path::PathBuf, time::Duration};

/// Smallest part size S3 accepts for every part of a multipart upload except the last
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Main configuration for the service
///
/// Fields are grouped into sub-configs:
/// - [`fetch`](FetchConfig) - yt-dlp binary, arguments, and the shared download directory
/// - [`proxy`](ProxyConfig) - egress proxy endpoints
/// - [`storage`](StorageConfig) - S3-compatible destination and multipart settings
/// - [`retry`](RetryConfig) - fetch attempt bound and linear backoff
/// - [`jobs`](JobConfig) - concurrency limits
/// - [`server`](ApiConfig) - HTTP surface
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Fetch tool settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Egress proxy settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Fetch retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Job scheduling limits
    #[serde(default)]
    pub jobs: JobConfig,

    /// API server settings
    #[serde(default)]
    pub server: ApiConfig,
}

/// Fetch tool (yt-dlp) configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Shared output directory; artifacts are named `<jobId>.<ext>` (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Format selector passed to `-f`
    #[serde(default = "default_format")]
    pub format: String,

    /// Container the merge step normalizes to (default: "mp4")
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,

    /// Session/cookie file, attached only when it exists on disk
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Extractor plugin directory, passed through unchanged
    #[serde(default)]
    pub plugin_dirs: Option<PathBuf>,

    /// ffmpeg location for the merge step (yt-dlp searches PATH if None)
    #[serde(default)]
    pub ffmpeg_location: Option<PathBuf>,

    /// Values passed as repeated `--extractor-args`
    #[serde(default = "default_extractor_args")]
    pub extractor_args: Vec<String>,

    /// Deadline for a single fetch attempt (None = no deadline)
    #[serde(default, with = "optional_duration_serde")]
    pub attempt_timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            download_dir: default_download_dir(),
            format: default_format(),
            merge_output_format: default_merge_output_format(),
            cookies_file: None,
            plugin_dirs: None,
            ffmpeg_location: None,
            extractor_args: default_extractor_args(),
            attempt_timeout: None,
        }
    }
}

/// Egress proxy configuration
///
/// One endpoint is created per port; all endpoints share host and credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy URL scheme (default: "http")
    #[serde(default = "default_proxy_scheme")]
    pub scheme: String,

    /// Proxy host name
    #[serde(default)]
    pub host: String,

    /// Ports, one endpoint each
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Proxy user name
    #[serde(default)]
    pub username: Option<String>,

    /// Proxy password
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            scheme: default_proxy_scheme(),
            host: String::new(),
            ports: Vec::new(),
            username: None,
            password: None,
        }
    }
}

/// S3-compatible object storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Destination bucket
    #[serde(default)]
    pub bucket: String,

    /// Region (default: "us-east-1")
    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible providers (path-style requests are used)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Access key ID
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Secret access key
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Allow plain HTTP endpoints (local MinIO and similar)
    #[serde(default)]
    pub allow_http: bool,

    /// Multipart part size in bytes (default: 25 MiB)
    #[serde(default = "default_part_size")]
    pub part_size: usize,

    /// Maximum parts in flight per upload (default: 4)
    #[serde(default = "default_max_concurrent_parts")]
    pub max_concurrent_parts: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
            part_size: default_part_size(),
            max_concurrent_parts: default_max_concurrent_parts(),
        }
    }
}

/// Fetch retry configuration
///
/// Backoff grows linearly: the delay before attempt `n > 0` is
/// `initial_delay + (n - 1) * delay_increment`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 10, so 11 attempts in total)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Added to the delay for each further retry (default: 5 seconds)
    #[serde(default = "default_delay_increment", with = "duration_serde")]
    pub delay_increment: Duration,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            delay_increment: default_delay_increment(),
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Total number of fetch attempts, including the first
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Job scheduling configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum jobs fetching or uploading at once (default: 4)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:3000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// API key required on protected routes
    #[serde(default)]
    pub api_key: Option<String>,

    /// Serve job routes without an API key (default: false)
    ///
    /// The server refuses to start with no `api_key` unless this is set.
    #[serde(default)]
    pub allow_unauthenticated: bool,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            api_key: None,
            allow_unauthenticated: false,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

impl ApiConfig {
    /// Check that the job routes are protected, or explicitly left open
    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_none() && !self.allow_unauthenticated {
            return Err(Error::config(
                "API_KEY is not set; set it or set ALLOW_UNAUTHENTICATED=true to serve job routes without a key",
                "API_KEY",
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is loaded first if present; variables
    /// already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Could not read .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read config file '{}': {}", path.display(), e),
            key: None,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Build configuration from environment-style variables
    ///
    /// Unset variables keep their defaults. `API_KEY`, `S3_*`, `PROXY_*` and
    /// `PORT` are read by these exact names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        if let Some(port) = get("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| Error::config(format!("invalid port '{port}'"), "PORT"))?;
            config.server.bind_address.set_port(port);
        }
        config.server.api_key = get("API_KEY");
        if let Some(open) = get("ALLOW_UNAUTHENTICATED") {
            config.server.allow_unauthenticated = parse_flag(&open).ok_or_else(|| {
                Error::config(
                    format!("invalid boolean '{open}'"),
                    "ALLOW_UNAUTHENTICATED",
                )
            })?;
        }

        if let Some(bucket) = get("S3_BUCKET") {
            config.storage.bucket = bucket;
        }
        if let Some(region) = get("S3_REGION") {
            config.storage.region = region;
        }
        config.storage.endpoint = get("S3_ENDPOINT");
        config.storage.access_key_id = get("S3_ACCESS_KEY");
        config.storage.secret_access_key = get("S3_SECRET_KEY");
        if let Some(endpoint) = &config.storage.endpoint {
            config.storage.allow_http = endpoint.starts_with("http://");
        }

        if let Some(scheme) = get("PROXY_SCHEME") {
            config.proxy.scheme = scheme;
        }
        if let Some(host) = get("PROXY_HOST") {
            config.proxy.host = host;
        }
        if let Some(ports) = get("PROXY_PORTS") {
            config.proxy.ports = parse_ports(&ports)?;
        }
        config.proxy.username = get("PROXY_USER");
        config.proxy.password = get("PROXY_PASS");

        if let Some(dir) = get("DOWNLOADS_DIR") {
            config.fetch.download_dir = PathBuf::from(dir);
        }
        config.fetch.binary_path = get("YTDLP_PATH").map(PathBuf::from);
        config.fetch.cookies_file = get("COOKIES_FILE").map(PathBuf::from);
        config.fetch.plugin_dirs = get("PLUGIN_DIRS").map(PathBuf::from);
        config.fetch.ffmpeg_location = get("FFMPEG_PATH").map(PathBuf::from);

        if let Some(max) = get("MAX_CONCURRENT_JOBS") {
            config.jobs.max_concurrent_jobs = max.parse().map_err(|_| {
                Error::config(format!("invalid job limit '{max}'"), "MAX_CONCURRENT_JOBS")
            })?;
        }

        Ok(config)
    }

    /// Check the settings the service cannot run without
    pub fn validate(&self) -> Result<()> {
        if self.proxy.ports.is_empty() {
            return Err(Error::config("no proxy ports configured", "proxy.ports"));
        }
        if self.proxy.host.is_empty() {
            return Err(Error::config("proxy host is empty", "proxy.host"));
        }
        if self.storage.bucket.is_empty() {
            return Err(Error::config("storage bucket is empty", "storage.bucket"));
        }
        if self.storage.part_size < MIN_PART_SIZE {
            return Err(Error::config(
                format!(
                    "part size {} is below the multipart minimum of {} bytes",
                    self.storage.part_size, MIN_PART_SIZE
                ),
                "storage.part_size",
            ));
        }
        if self.storage.max_concurrent_parts == 0 {
            return Err(Error::config(
                "at least one concurrent part is required",
                "storage.max_concurrent_parts",
            ));
        }
        if self.jobs.max_concurrent_jobs == 0 {
            return Err(Error::config(
                "at least one concurrent job is required",
                "jobs.max_concurrent_jobs",
            ));
        }
        Ok(())
    }
}

fn parse_ports(raw: &str) -> Result<Vec<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u16>()
                .map_err(|_| Error::config(format!("invalid proxy port '{p}'"), "PROXY_PORTS"))
        })
        .collect()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_format() -> String {
    "bv*[height<=1080]+ba/b[height<=1080]/bv*+ba/b".to_string()
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_extractor_args() -> Vec<String> {
    vec!["youtube:player_client=mweb".to_string()]
}

fn default_proxy_scheme() -> String {
    "http".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_part_size() -> usize {
    25 * 1024 * 1024
}

fn default_max_concurrent_parts() -> usize {
    4
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_delay_increment() -> Duration {
    Duration::from_secs(5)
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
