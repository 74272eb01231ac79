//! Buffers the upstream response, extracts usage for chat/completions-style
//! paths, and wraps non-2xx responses in the standard error envelope.

use bytes::Bytes;
use http::HeaderMap;
use llmproxy_provider_core::{ProviderRecord, auth::build_auth_headers};
use serde_json::{Value, json};
use std::time::Instant as StdInstant;

use crate::context::ProxyContext;
use crate::http_bridge::to_wreq_method;
use crate::response::{ExecutorResult, UpstreamResponse};
use crate::retry::{self, AttemptError};

pub struct ForwardOutcome {
    pub status: u16,
    pub body: Value,
}

#[allow(clippy::too_many_arguments)]
pub async fn forward(
    ctx: &ProxyContext,
    provider: &ProviderRecord,
    client: &wreq::Client,
    method: http::Method,
    outbound_url: String,
    sanitized_headers: HeaderMap,
    raw_body: Bytes,
    path_suffix: &str,
    group_id: &str,
) -> ForwardOutcome {
    let started = StdInstant::now();
    let result = retry::execute(&provider.breaker, &provider.retry_policy, || {
        let sanitized_headers = sanitized_headers.clone();
        let raw_body = raw_body.clone();
        let outbound_url = outbound_url.clone();
        let method = method.clone();
        async move {
            let auth_headers = build_auth_headers(&provider.auth, provider.token_cache.as_ref(), client, &provider.prefix)
                .await
                .map_err(|err| AttemptError::Request(err.to_string()))?;

            let mut builder = client.request(to_wreq_method(&method), &outbound_url);
            for (name, value) in sanitized_headers.iter() {
                if let Ok(value_str) = value.to_str() {
                    builder = builder.header(name.as_str(), value_str);
                }
            }
            for (name, value) in auth_headers.iter() {
                if let Ok(value_str) = value.to_str() {
                    builder = builder.header(name.as_str(), value_str);
                }
            }
            builder = builder.body(raw_body.to_vec());

            let response = builder.send().await.map_err(classify_send_error)?;
            let status = response.status().as_u16();
            let headers = crate::http_bridge::from_wreq_headers(response.headers());
            let body = response.bytes().await.map_err(|err| AttemptError::Request(err.to_string()))?;
            Ok(UpstreamResponse { status, headers, body })
        }
    })
    .await;

    match result {
        ExecutorResult::Synthetic(err) => ForwardOutcome { status: err.status, body: err.body },
        ExecutorResult::Upstream(response) => {
            handle_upstream_response(ctx, provider, response, &raw_body, path_suffix, group_id, started).await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_upstream_response(
    ctx: &ProxyContext,
    provider: &ProviderRecord,
    response: UpstreamResponse,
    raw_body: &Bytes,
    path_suffix: &str,
    group_id: &str,
    started: StdInstant,
) -> ForwardOutcome {
    let status = response.status;
    let parsed: Value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);

    if (200..300).contains(&status) {
        if path_suffix.contains("completions") {
            let model = parsed.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
            if let Some(usage) = parsed.get("usage") {
                ctx.metrics.record_usage(usage, &model, group_id);
            }
            ctx.trace
                .submit(crate::trace::TraceRecord {
                    model: Some(model),
                    provider: Some(provider.prefix.clone()),
                    input_body: String::from_utf8_lossy(raw_body).into_owned(),
                    output_body: parsed.to_string(),
                    status_code: status,
                    usage: parsed.get("usage").cloned(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    group_id: group_id.to_string(),
                    is_streaming: false,
                })
                .await;
        }
        ForwardOutcome { status, body: parsed }
    } else {
        let message = parsed
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Proxy request failed")
            .to_string();
        let envelope = json!({
            "error": {
                "status_code": status,
                "message": message,
                "details": { "response": parsed },
            }
        });
        ForwardOutcome { status, body: envelope }
    }
}

fn classify_send_error(err: wreq::Error) -> AttemptError {
    if err.is_connect() || err.is_timeout() {
        AttemptError::Connection(err.to_string())
    } else {
        AttemptError::Request(err.to_string())
    }
}
