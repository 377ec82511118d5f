use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::tracing::{scope_request_id, RequestId};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied id we keep; anything longer is replaced
const MAX_REQUEST_ID_LEN: usize = 128;

fn caller_request_id(request: &Request) -> Option<RequestId> {
    request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(RequestId::new)
}

/// Tags the request with an id, makes it available to error responses and
/// echoes it back on the response
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = caller_request_id(&request).unwrap_or_default();
    let header_value = HeaderValue::from_str(request_id.as_str()).ok();
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    if let Some(value) = header_value.clone() {
        request.headers_mut().insert(header_name.clone(), value);
    }
    request.extensions_mut().insert(request_id.clone());

    let mut response = scope_request_id(request_id, next.run(request)).await;
    if let Some(value) = header_value {
        response.headers_mut().insert(header_name, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::Extension,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn echo(Extension(request_id): Extension<RequestId>) -> (StatusCode, String) {
        (StatusCode::OK, request_id.0)
    }

    fn app() -> Router {
        Router::new()
            .route("/wishlist/counter/", get(echo))
            .layer(axum::middleware::from_fn(request_id_middleware))
    }

    #[tokio::test]
    async fn generates_an_id_when_none_is_sent() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/wishlist/counter/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert!(uuid::Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn keeps_the_callers_id() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/wishlist/counter/")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }

    #[tokio::test]
    async fn oversized_ids_are_replaced() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/wishlist/counter/")
                    .header(REQUEST_ID_HEADER, "x".repeat(MAX_REQUEST_ID_LEN + 1))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap();
        assert_ne!(id.len(), MAX_REQUEST_ID_LEN + 1);
    }
}
