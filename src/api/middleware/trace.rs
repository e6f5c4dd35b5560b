use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// HTTP header name for trace ID
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

tokio::task_local! {
    static TRACE_ID: String;
}

/// Trace ID of the request being served on this task, if any
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(|id| id.clone()).ok()
}

/// Assigns every request a trace ID.
///
/// The ID tags the request span, is readable through [`current_trace_id`]
/// for the lifetime of the handler, and is echoed in the `X-Trace-Id`
/// response header.
pub async fn trace_id_middleware(request: Request, next: Next) -> Response {
    let trace_id = Uuid::new_v4().to_string();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        uri = %request.uri(),
    );

    tracing::debug!(parent: &span, "Request started");

    let mut response = TRACE_ID
        .scope(
            trace_id.clone(),
            async move {
                let response = next.run(request).await;
                tracing::info!(status = %response.status(), "Request completed");
                response
            }
            .instrument(span),
        )
        .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{ErrorResponse, WardenError};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::util::ServiceExt;

    async fn echo_trace_id() -> impl IntoResponse {
        (StatusCode::OK, current_trace_id().unwrap_or_default())
    }

    async fn failing() -> WardenError {
        WardenError::Unauthenticated
    }

    fn app() -> Router {
        Router::new()
            .route("/echo", get(echo_trace_id))
            .route("/fail", get(failing))
            .layer(middleware::from_fn(trace_id_middleware))
    }

    fn header_trace_id(response: &Response) -> String {
        response
            .headers()
            .get(TRACE_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_header_matches_handler_view() {
        let response = app()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = header_trace_id(&response);
        assert!(Uuid::parse_str(&header).is_ok());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), header);
    }

    #[tokio::test]
    async fn test_error_body_carries_request_trace_id() {
        let response = app()
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let header = header_trace_id(&response);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.trace_id, header);
    }

    #[tokio::test]
    async fn test_trace_id_unique_per_request() {
        let app = app();
        let first = app
            .clone()
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let second = app
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_ne!(header_trace_id(&first), header_trace_id(&second));
    }

    #[test]
    fn test_no_trace_id_outside_request() {
        assert_eq!(current_trace_id(), None);
    }
}
