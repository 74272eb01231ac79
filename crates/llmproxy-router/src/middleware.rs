//! Records the HTTP request-count/duration metrics for every response except
//! multipart uploads, whose bodies are never buffered for inspection and
//! which skip retries and counters alike.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;

use llmproxy_core::metrics::canonicalize_endpoint;
use llmproxy_core::ProxyContext;

pub async fn record_http_metrics(State(ctx): State<Arc<ProxyContext>>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let endpoint = canonicalize_endpoint(request.uri().path());
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);
    let is_chunked_upload = request.method() == Method::POST
        && request
            .headers()
            .get(TRANSFER_ENCODING)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false);

    if is_multipart || is_chunked_upload {
        return next.run(request).await;
    }

    let started = Instant::now();
    let response = next.run(request).await;
    let duration_s = started.elapsed().as_secs_f64();
    ctx.metrics.record_http_request(&method, &endpoint, response.status().as_u16(), duration_s);
    response
}
