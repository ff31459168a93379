//! REST API server module
//!
//! Exposes job submission and status polling over HTTP, plus an SSE event feed
//! and the OpenAPI document.

use crate::{Config, JobService, Result};
use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Jobs (API key required when configured)
/// - `POST /download` - Submit a URL, returns `{"jobId": ...}`
/// - `GET /status/:jobId` - Job snapshot
/// - `GET /events` - Server-sent events stream
///
/// ## Public
/// - `GET /docs` - OpenAPI specification
/// - `GET /health` - Health check
pub fn create_router(service: JobService, config: Arc<Config>) -> Router {
    let state = AppState::new(service, config.clone());

    let protected = Router::new()
        .route("/download", post(routes::submit_download))
        .route("/status/:job_id", get(routes::job_status))
        .route("/events", get(routes::event_stream))
        .route_layer(middleware::from_fn_with_state(
            config.server.api_key.clone(),
            auth::require_api_key,
        ));

    let public = Router::new()
        .route("/docs", get(routes::openapi_spec))
        .route("/health", get(routes::health_check));

    let router = protected
        .merge(public)
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.server.cors_enabled {
        router.layer(build_cors_layer(&config.server.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any origin)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on the configured bind address until `shutdown` resolves
///
/// Fails before binding when no API key is configured and
/// `allow_unauthenticated` is not set.
///
/// # Example
///
/// ```no_run
/// use yloader::{Config, JobService};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::from_env()?);
/// let service = JobService::new((*config).clone()).await?;
///
/// yloader::api::start_api_server(service, config, std::future::pending()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server<F>(service: JobService, config: Arc<Config>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.server.validate()?;
    let bind_address = config.server.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(service, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().unwrap_or(bind_address),
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
