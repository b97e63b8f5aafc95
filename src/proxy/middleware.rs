//! Middleware implementations for the gateway

use crate::proxy::headers::X_REQUEST_ID;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Correlation id for log lines: the caller's `x-request-id`, else a fresh one
///
/// The request itself is not modified.
pub fn correlation_id(request: &Request) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string())
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request details before passing ownership
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = correlation_id(&request);

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        warn!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware::from_fn, routing::any, Router};
    use tower::ServiceExt;

    #[test]
    fn test_correlation_id_prefers_caller_value() {
        let request = Request::builder()
            .header(X_REQUEST_ID, "req-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(correlation_id(&request), "req-123");
    }

    #[test]
    fn test_correlation_id_is_generated_when_absent() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let id = correlation_id(&request);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_logging_middleware_passes_request_and_response_through() {
        let app = Router::new()
            .fallback(any(|request: Request| async move {
                // No request id is injected
                assert!(request.headers().get(X_REQUEST_ID).is_none());
                (StatusCode::ACCEPTED, "done")
            }))
            .layer(from_fn(logging_middleware));

        let response = app
            .oneshot(Request::builder().uri("/a").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(response.headers().get(X_REQUEST_ID).is_none());
    }
}
