//! yloader server binary
//!
//! Reads configuration from `YLOADER_CONFIG` (a JSON file) when set, otherwise
//! from the environment and an optional `.env` file, then serves the REST API
//! until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use yloader::{Config, JobService};

const CONFIG_PATH_VAR: &str = "YLOADER_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,yloader=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "yloader exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> yloader::Result<()> {
    let config = match std::env::var_os(CONFIG_PATH_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            tracing::info!(path = %path.display(), "Loading configuration file");
            Config::from_file(&path)?
        }
        None => Config::from_env()?,
    };
    config.validate()?;
    config.server.validate()?;

    if config.server.api_key.is_none() {
        tracing::warn!("ALLOW_UNAUTHENTICATED is set; job routes are open to anyone who can reach the server");
    }

    tracing::info!(
        proxies = config.proxy.ports.len(),
        bucket = %config.storage.bucket,
        max_concurrent_jobs = config.jobs.max_concurrent_jobs,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let service = JobService::new((*config).clone()).await?;

    yloader::api::start_api_server(service.clone(), config, yloader::shutdown_signal()).await?;

    service.shutdown().await
}
