use super::*;
use crate::config::ProxyConfig;
use crate::error::{FetchError, UploadError};
use crate::fetch::{FetchRequest, FetchRunner};
use crate::types::{JobInfo, JobStatus};
use crate::upload::Uploader;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use tower::ServiceExt;


/// Writes `<jobId>.mp4` immediately
struct InstantFetcher;

#[async_trait]
impl FetchRunner for InstantFetcher {
    async fn run(
        &self,
        request: &FetchRequest,
        progress: mpsc::Sender<f32>,
    ) -> std::result::Result<PathBuf, FetchError> {
        progress.send(50.0).await.ok();
        let path = request.output_dir.join(format!("{}.mp4", request.job_id));
        tokio::fs::write(&path, b"media").await.unwrap();
        Ok(path)
    }

    fn name(&self) -> &'static str {
        "instant"
    }
}

struct OkUploader;

#[async_trait]
impl Uploader for OkUploader {
    async fn upload(&self, _local_path: &Path, key: &str) -> std::result::Result<String, UploadError> {
        Ok(format!("https://s3.example.com/media/{key}"))
    }
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.fetch.download_dir = dir.join("downloads");
    config.proxy = ProxyConfig {
        host: "proxy.example.net".into(),
        ports: vec![10001, 10002, 10003],
        ..ProxyConfig::default()
    };
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.delay_increment = Duration::from_millis(1);
    config
}

/// Router over stub backends; keep the TempDir alive for the test's duration
async fn create_test_app(api_key: Option<&str>) -> (Router, JobService, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.api_key = api_key.map(str::to_string);
    let config = Arc::new(config);

    let service = JobService::with_components(
        (*config).clone(),
        Arc::new(InstantFetcher),
        Arc::new(OkUploader),
    )
    .await
    .unwrap();

    (create_router(service.clone(), config), service, temp_dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    config.server.api_key = Some("test-key".into());
    let config = Arc::new(config);
    let service = JobService::with_components(
        (*config).clone(),
        Arc::new(InstantFetcher),
        Arc::new(OkUploader),
    )
    .await
    .unwrap();

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(service, config, async move {
        stop_rx.await.ok();
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_api_server_refuses_to_start_without_api_key() {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    let service = JobService::with_components(
        config.clone(),
        Arc::new(InstantFetcher),
        Arc::new(OkUploader),
    )
    .await
    .unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        start_api_server(service.clone(), Arc::new(config.clone()), std::future::pending()),
    )
    .await
    .expect("server should fail before binding");
    match result {
        Err(crate::error::Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("API_KEY")),
        other => panic!("expected config error, got {other:?}"),
    }

    config.server.allow_unauthenticated = true;
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(service, Arc::new(config), async move {
        stop_rx.await.ok();
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after the shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_headers_present_when_enabled() {
    let (app, _service, _temp_dir) = create_test_app(None).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_cors_headers_absent_when_disabled() {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.server.cors_enabled = false;
    let config = Arc::new(config);
    let service = JobService::with_components(
        (*config).clone(),
        Arc::new(InstantFetcher),
        Arc::new(OkUploader),
    )
    .await
    .unwrap();
    let app = create_router(service, config);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(!response.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_api_key_guards_job_routes_but_not_public_ones() {
    let (app, _service, _temp_dir) = create_test_app(Some("test-secret-key")).await;

    let response = app
        .clone()
        .oneshot(post_json("/download", r#"{"url":"https://video.example.com/a"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = post_json("/download", r#"{"url":"https://video.example.com/a"}"#);
    request
        .headers_mut()
        .insert("x-api-key", "test-secret-key".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(&format!("/status/{}", crate::types::JobId::new())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for public in ["/docs", "/health"] {
        let response = app.clone().oneshot(get_request(public)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{public} should be public");
    }
}

#[tokio::test]
async fn test_api_key_accepted_as_query_parameter() {
    let (app, _service, _temp_dir) = create_test_app(Some("k3y")).await;

    let response = app
        .oneshot(get_request(&format!(
            "/status/{}?api_key=k3y",
            crate::types::JobId::new()
        )))
        .await
        .unwrap();
    // Authenticated, so the unknown job is reported rather than rejected
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Poll the status route until the job is terminal
async fn poll_until_terminal(app: &Router, job_id: &str) -> JobInfo {
    for _ in 0..500 {
        let response = app
            .clone()
            .oneshot(get_request(&format!("/status/{job_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let info: JobInfo = serde_json::from_value(body_json(response).await).unwrap();
        if info.status.is_terminal() {
            return info;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal status");
}

#[tokio::test]
async fn test_submitted_job_completes_end_to_end() {
    let (app, _service, _temp_dir) = create_test_app(None).await;

    let response = app
        .clone()
        .oneshot(post_json("/download", r#"{"url":"https://video.example.com/a"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = body_json(response).await["jobId"]
        .as_str()
        .unwrap()
        .to_string();

    let info = poll_until_terminal(&app, &job_id).await;
    assert_eq!(info.status, JobStatus::Completed);
    assert_eq!(info.progress, 100.0);
    assert_eq!(
        info.result_location,
        Some(format!("https://s3.example.com/media/{job_id}.mp4"))
    );
    assert!(info.error.is_none());
}
