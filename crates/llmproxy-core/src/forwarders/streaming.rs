//! Forwards SSE chunks byte-for-byte as they arrive — never buffering
//! the whole stream — while accumulating the text on the side so the
//! terminal `data:` frame can be parsed for usage once the stream ends.
//! Streaming calls are never retried (bodies aren't replayable).

use std::time::Instant;

use bytes::Bytes;
use futures_util::StreamExt;
use http::HeaderMap;
use llmproxy_provider_core::{ProviderRecord, auth::build_auth_headers};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::ProxyContext;
use crate::http_bridge::to_wreq_method;
use crate::metrics::MetricsRecorder;
use crate::trace::{TraceRecord, TraceSinkAdapter};

const CHANNEL_CAPACITY: usize = 32;
const DONE_FRAME: &str = "data: [DONE]";

pub enum StreamOutcome {
    /// A 2xx upstream response: the client gets `text/event-stream` with
    /// `status`, fed from `receiver` chunk by chunk.
    Sse { status: u16, receiver: mpsc::Receiver<Bytes> },
    /// Connection failure or non-2xx upstream response: a plain JSON body.
    Json { status: u16, body: Value },
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
    group_id: &str,
) -> StreamOutcome {
    let auth_headers = match build_auth_headers(&provider.auth, provider.token_cache.as_ref(), client, &provider.prefix).await
    {
        Ok(headers) => headers,
        Err(err) => {
            return StreamOutcome::Json {
                status: 500,
                body: serde_json::json!({ "error": format!("authentication error: {err}") }),
            };
        }
    };

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

    let response = match builder.send().await {
        Ok(response) => response,
        Err(_) => {
            return StreamOutcome::Json {
                status: 502,
                body: serde_json::json!({
                    "error": { "status_code": 502, "message": "Upstream connection failed" }
                }),
            };
        }
    };

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        let body = response.bytes().await.unwrap_or_default();
        let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        return StreamOutcome::Json { status, body: parsed };
    }

    let (tx, rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
    let metrics = ctx.metrics.clone();
    let trace = ctx.trace.clone();
    let provider_prefix = provider.prefix.clone();
    let group_id = group_id.to_string();
    let started = Instant::now();
    let input_body = String::from_utf8_lossy(&raw_body).into_owned();

    tokio::spawn(async move {
        let mut stream = response.bytes_stream();
        let mut accumulated = String::new();
        while let Some(chunk) = stream.next().await {
            let Ok(bytes) = chunk else { break };
            accumulated.push_str(&String::from_utf8_lossy(&bytes));
            if tx.send(bytes).await.is_err() {
                // client disconnected: stop reading upstream immediately.
                break;
            }
        }
        extract_and_emit_metrics(
            &accumulated,
            &input_body,
            &metrics,
            &trace,
            &provider_prefix,
            &group_id,
            status,
            started,
        )
        .await;
    });

    StreamOutcome::Sse { status, receiver: rx }
}

/// Splits the accumulated transcript on newlines, keeps the last `data:`
/// frame that isn't `[DONE]`, and emits metrics/trace if it carries `usage`.
#[allow(clippy::too_many_arguments)]
async fn extract_and_emit_metrics(
    transcript: &str,
    input_body: &str,
    metrics: &MetricsRecorder,
    trace: &TraceSinkAdapter,
    provider: &str,
    group_id: &str,
    status: u16,
    started: Instant,
) {
    let Some(last_frame) = transcript
        .lines()
        .filter(|line| line.starts_with("data:") && line.trim() != DONE_FRAME)
        .next_back()
    else {
        return;
    };

    let payload = last_frame.trim_start_matches("data:").trim();
    let Ok(parsed) = serde_json::from_str::<Value>(payload) else { return };
    let Some(usage) = parsed.get("usage") else { return };

    let model = parsed.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
    metrics.record_usage(usage, &model, group_id);
    trace
        .submit(TraceRecord {
            model: Some(model),
            provider: Some(provider.to_string()),
            input_body: input_body.to_string(),
            output_body: parsed.to_string(),
            status_code: status,
            usage: Some(usage.clone()),
            duration_ms: started.elapsed().as_millis() as u64,
            group_id: group_id.to_string(),
            is_streaming: true,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_last_data_frame_ignoring_done() {
        let transcript = "data: {\"usage\":{\"prompt_tokens\":1}}\n\ndata: {\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2,\"total_tokens\":7},\"model\":\"m\"}\n\ndata: [DONE]\n\n";
        let last = transcript
            .lines()
            .filter(|line| line.starts_with("data:") && line.trim() != DONE_FRAME)
            .next_back()
            .unwrap();
        let payload = last.trim_start_matches("data:").trim();
        let parsed: Value = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed["usage"]["total_tokens"], 7);
        assert_eq!(parsed["model"], "m");
    }
}
