use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use futures_util::StreamExt;
use llmproxy_core::forwarders::{build_outbound_url, group_id_from_header, multipart, nonstreaming, rewrite_model_field, streaming::{self, StreamOutcome}};
use llmproxy_core::health::build_report;
use llmproxy_core::ProxyContext;
use llmproxy_provider_core::{headers as header_hygiene, ProviderRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;

pub async fn health_handler(State(ctx): State<Arc<ProxyContext>>) -> impl IntoResponse {
    let breaker_open = ctx.legacy_provider.breaker.status().is_open;
    let report = build_report(
        ctx.proxy_enabled,
        breaker_open,
        ctx.prompt_hub_enabled,
        ctx.chain_hub_enabled,
        ctx.llm_hub_enabled,
        &ctx.version,
    );
    Json(report)
}

pub async fn metrics_handler(State(ctx): State<Arc<ProxyContext>>) -> impl IntoResponse {
    match ctx.metrics.gather_text() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct VersionQuery {
    model_name: Option<String>,
}

pub async fn llm_version_handler(
    State(ctx): State<Arc<ProxyContext>>,
    Query(query): Query<VersionQuery>,
) -> impl IntoResponse {
    let model_name = query.model_name.unwrap_or_default();
    let provider = ctx.legacy_provider.clone();
    let client = match ctx.client_for(&provider, llmproxy_core::context::LEGACY_CLIENT_KEY) {
        Ok(client) => client,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };

    let probe_body = Bytes::from(
        json!({
            "model": model_name,
            "messages": [{ "role": "user", "content": "Reply with any single digit" }],
            "stream": false,
            "update_interval": 0,
        })
        .to_string(),
    );
    let outbound_url = build_outbound_url(&provider.base_url, "v1/chat/completions", "");

    let outcome = nonstreaming::forward(
        &ctx,
        &provider,
        &client,
        Method::POST,
        outbound_url,
        HeaderMap::new(),
        probe_body,
        "v1/chat/completions",
        "unknown",
    )
    .await;

    if !(200..300).contains(&outcome.status) {
        return (status_code(outcome.status), Json(outcome.body)).into_response();
    }

    let reported_model = outcome.body.get("model").and_then(Value::as_str).unwrap_or_default();
    match llmproxy_core::model_version::reformat(reported_model) {
        Some(version) => (StatusCode::OK, Json(json!({ "version": version }))).into_response(),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "upstream reported a malformed model version" })),
        )
            .into_response(),
    }
}

pub async fn llm_models_handler(State(ctx): State<Arc<ProxyContext>>, request: Request) -> impl IntoResponse {
    if !ctx.registry.is_empty() {
        return Json(ctx.registry.merged_models()).into_response();
    }

    let provider = ctx.legacy_provider.clone();
    let client = match ctx.client_for(&provider, llmproxy_core::context::LEGACY_CLIENT_KEY) {
        Ok(client) => client,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };
    let query = request.uri().query().unwrap_or("").to_string();
    let sanitized = header_hygiene::sanitize(request.headers(), &ctx.denylist_patterns);
    let outbound_url = build_outbound_url(&provider.base_url, "v1/models", &query);

    let outcome = nonstreaming::forward(
        &ctx,
        &provider,
        &client,
        Method::GET,
        outbound_url,
        sanitized,
        Bytes::new(),
        "v1/models",
        "unknown",
    )
    .await;
    (status_code(outcome.status), Json(outcome.body)).into_response()
}

pub async fn proxy_handler(
    State(ctx): State<Arc<ProxyContext>>,
    Path(path_suffix): Path<String>,
    request: Request,
) -> Response {
    let method = request.method().clone();
    let incoming_headers = request.headers().clone();
    let query = request.uri().query().unwrap_or("").to_string();
    let group_id = group_id_from_header(&incoming_headers);
    let content_type = incoming_headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if method == Method::POST && content_type.starts_with("multipart/form-data") {
        return handle_multipart(&ctx, method, &path_suffix, &query, &incoming_headers, request.into_body()).await;
    }

    let body_bytes = match axum::body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "failed to read request body" }))).into_response();
        }
    };

    let (provider, cache_key, outbound_body) = resolve_provider(&ctx, &method, &body_bytes);
    let client = match ctx.client_for(&provider, &cache_key) {
        Ok(client) => client,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };

    let sanitized = header_hygiene::sanitize(&incoming_headers, &ctx.denylist_patterns);
    let outbound_url = build_outbound_url(&provider.base_url, &path_suffix, &query);

    if is_streaming_request(&outbound_body) {
        match streaming::forward(&ctx, &provider, &client, method, outbound_url, sanitized, outbound_body, &group_id).await
        {
            StreamOutcome::Sse { status, receiver } => build_sse_response(status, receiver),
            StreamOutcome::Json { status, body } => (status_code(status), Json(body)).into_response(),
        }
    } else {
        let outcome = nonstreaming::forward(
            &ctx,
            &provider,
            &client,
            method,
            outbound_url,
            sanitized,
            outbound_body,
            &path_suffix,
            &group_id,
        )
        .await;
        (status_code(outcome.status), Json(outcome.body)).into_response()
    }
}

async fn handle_multipart(
    ctx: &Arc<ProxyContext>,
    method: Method,
    path_suffix: &str,
    query: &str,
    incoming_headers: &HeaderMap,
    body: Body,
) -> Response {
    let provider = ctx.legacy_provider.clone();
    let client = match ctx.client_for(&provider, llmproxy_core::context::LEGACY_CLIENT_KEY) {
        Ok(client) => client,
        Err(err) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() }))).into_response();
        }
    };
    let sanitized = header_hygiene::sanitize(incoming_headers, &ctx.denylist_patterns);
    let stripped = multipart::strip_extra_hop_by_hop(&sanitized);
    let outbound_url = build_outbound_url(&provider.base_url, path_suffix, query);

    let body_stream = body.into_data_stream().map(|chunk| {
        chunk.map_err(|err| std::io::Error::other(err.to_string()))
    });

    let outcome = multipart::forward(&client, method, outbound_url, stripped, body_stream).await;
    (status_code(outcome.status), Json(outcome.body)).into_response()
}

fn resolve_provider(ctx: &ProxyContext, method: &Method, body_bytes: &Bytes) -> (Arc<ProviderRecord>, String, Bytes) {
    if !ctx.registry.is_empty() && *method == Method::POST {
        if let Ok(parsed) = serde_json::from_slice::<Value>(body_bytes) {
            if let Some(model) = parsed.get("model").and_then(Value::as_str) {
                if model.contains('/') {
                    if let Some((provider, stripped)) = ctx.registry.resolve(model) {
                        let rewritten = rewrite_model_field(body_bytes, model, &stripped);
                        let cache_key = provider.prefix.clone();
                        return (provider, cache_key, rewritten);
                    }
                }
            }
        }
    }
    (
        ctx.legacy_provider.clone(),
        llmproxy_core::context::LEGACY_CLIENT_KEY.to_string(),
        body_bytes.clone(),
    )
}

fn is_streaming_request(body: &Bytes) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("stream").and_then(Value::as_bool))
        .unwrap_or(false)
}

fn build_sse_response(status: u16, receiver: tokio::sync::mpsc::Receiver<Bytes>) -> Response {
    let stream = ReceiverStream::new(receiver).map(Ok::<_, std::convert::Infallible>);
    Response::builder()
        .status(status_code(status))
        .header(http::header::CONTENT_TYPE, "text/event-stream")
        .header(http::header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR, "response_build_failed").into_response())
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
