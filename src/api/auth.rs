//! Authentication middleware for the REST API
//!
//! When `ApiConfig::api_key` is set, protected routes require the key in either
//! the `X-Api-Key` header or the `api_key` query parameter. The header wins when
//! both are present.

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Query parameter accepted as an alternative to the header
const API_KEY_QUERY_PARAM: &str = "api_key";

/// Middleware that rejects requests without the configured API key
///
/// # Examples
///
/// ```no_run
/// use axum::{Router, middleware};
/// use yloader::api::auth::require_api_key;
///
/// let api_key = Some("secret-key-123".to_string());
/// let router: Router = Router::new()
///     .layer(middleware::from_fn_with_state(api_key, require_api_key));
/// ```
pub async fn require_api_key(
    State(expected_api_key): State<Option<String>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected_key) = expected_api_key else {
        return next.run(request).await;
    };

    match provided_key(&request) {
        Some(provided) if constant_time_eq(provided.as_bytes(), expected_key.as_bytes()) => {
            next.run(request).await
        }
        Some(_) => unauthorized_response("Invalid API key"),
        None => unauthorized_response("Missing X-Api-Key header or api_key query parameter"),
    }
}

fn provided_key(request: &Request) -> Option<String> {
    let header = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if header.is_some() {
        return header;
    }

    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == API_KEY_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Constant-time byte comparison to prevent timing side-channel attacks.
/// Always compares all bytes regardless of where the first mismatch occurs.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized_response(message: &str) -> Response {
    let body = Json(json!({
        "error": {
            "code": "unauthorized",
            "message": message
        }
    }));

    (StatusCode::UNAUTHORIZED, body).into_response()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request, middleware, routing::get};
    use tower::ServiceExt;

    async fn ok_handler() -> impl IntoResponse {
        (StatusCode::OK, "Success")
    }

    fn app(key: Option<&str>) -> Router {
        Router::new()
            .route("/test", get(ok_handler))
            .layer(middleware::from_fn_with_state(
                key.map(str::to_string),
                require_api_key,
            ))
    }

    async fn status_for(app: Router, request: Request<Body>) -> StatusCode {
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_no_key_configured_allows_everything() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert_eq!(status_for(app(None), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_header_key_is_accepted() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Api-Key", "s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(app(Some("s3cret")), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_key_is_accepted() {
        let request = Request::builder()
            .uri("/test?foo=1&api_key=s3cret")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(app(Some("s3cret")), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_query_key_is_percent_decoded() {
        let request = Request::builder()
            .uri("/test?api_key=a%2Bb%3D")
            .body(Body::empty())
            .unwrap();
        assert_eq!(status_for(app(Some("a+b=")), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_wrong_key_is_rejected_with_json_body() {
        let request = Request::builder()
            .uri("/test")
            .header("X-Api-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        let response = app(Some("s3cret")).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "unauthorized");
        assert_eq!(json["error"]["message"], "Invalid API key");
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected() {
        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();
        assert_eq!(
            status_for(app(Some("s3cret")), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_wrong_header_is_not_rescued_by_query() {
        let request = Request::builder()
            .uri("/test?api_key=s3cret")
            .header("X-Api-Key", "wrong")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_for(app(Some("s3cret")), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_constant_time_eq_compares_exactly() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(!constant_time_eq(b"Key", b"key"));
    }
}
