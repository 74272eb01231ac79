//! Prometheus-backed counters: per-call token usage (labelled by
//! `{type,name,group_id,model}`) plus HTTP-level request count/duration.
//! Grounded on the `prometheus` crate's text exposition as used across the
//! example pack (`m3u-proxy`'s `/metrics` handler): one process-wide
//! `Registry`, gathered and encoded on demand rather than pushed anywhere.

use prometheus::{HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::Value;

const SINK_NAME: &str = "proxy";

pub struct MetricsRecorder {
    registry: Registry,
    total_tokens: IntCounterVec,
    prompt_tokens: IntCounterVec,
    completion_tokens: IntCounterVec,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();

        let usage_labels = ["type", "name", "group_id", "model"];
        let total_tokens = IntCounterVec::new(
            Opts::new("llm_total_token_usage", "Total tokens observed per upstream call"),
            &usage_labels,
        )
        .expect("metric definition is valid");
        let prompt_tokens = IntCounterVec::new(
            Opts::new("llm_prompt_token_usage", "Prompt tokens observed per upstream call"),
            &usage_labels,
        )
        .expect("metric definition is valid");
        let completion_tokens = IntCounterVec::new(
            Opts::new("llm_completion_token_usage", "Completion tokens observed per upstream call"),
            &usage_labels,
        )
        .expect("metric definition is valid");

        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests handled by the proxy"),
            &["method", "endpoint", "status_code"],
        )
        .expect("metric definition is valid");
        let http_duration = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request handling duration",
            ),
            &["method", "endpoint"],
        )
        .expect("metric definition is valid");

        registry.register(Box::new(total_tokens.clone())).expect("unique metric name");
        registry.register(Box::new(prompt_tokens.clone())).expect("unique metric name");
        registry.register(Box::new(completion_tokens.clone())).expect("unique metric name");
        registry.register(Box::new(http_requests.clone())).expect("unique metric name");
        registry.register(Box::new(http_duration.clone())).expect("unique metric name");

        Self {
            registry,
            total_tokens,
            prompt_tokens,
            completion_tokens,
            http_requests,
            http_duration,
        }
    }

    /// Reads `usage.{prompt_tokens,completion_tokens,total_tokens}` off a
    /// parsed upstream response and records them against `model`/`group_id`.
    pub fn record_usage(&self, usage: &Value, model: &str, group_id: &str) {
        let prompt = usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0);
        let completion = usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0);
        let total = usage.get("total_tokens").and_then(Value::as_u64).unwrap_or(0);

        self.prompt_tokens
            .with_label_values(&["prompt", SINK_NAME, group_id, model])
            .inc_by(prompt);
        self.completion_tokens
            .with_label_values(&["completion", SINK_NAME, group_id, model])
            .inc_by(completion);
        self.total_tokens
            .with_label_values(&["total", SINK_NAME, group_id, model])
            .inc_by(total);
    }

    pub fn record_http_request(&self, method: &str, endpoint: &str, status_code: u16, duration_s: f64) {
        let endpoint = canonicalize_endpoint(endpoint);
        self.http_requests
            .with_label_values(&[method, &endpoint, &status_code.to_string()])
            .inc();
        self.http_duration.with_label_values(&[method, &endpoint]).observe(duration_s);
    }

    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replaces any path segment that looks like a hex UUID-like token (8+ hex
/// chars, optionally dash-grouped) or a pure numeric token with `:id`, to
/// bound label cardinality.
pub fn canonicalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|segment| if is_id_like(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_id_like(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    let hex_len: usize = segment.split('-').map(str::len).sum();
    let groups = segment.split('-').count();
    groups <= 5
        && hex_len >= 8
        && segment.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_numeric_and_uuid_segments() {
        assert_eq!(canonicalize_endpoint("/llm/v1/models/123"), "/llm/v1/models/:id");
        assert_eq!(
            canonicalize_endpoint("/llm/v1/chat/550e8400-e29b-41d4-a716-446655440000"),
            "/llm/v1/chat/:id"
        );
        assert_eq!(canonicalize_endpoint("/llm/v1/models"), "/llm/v1/models");
    }

    #[test]
    fn records_usage_from_parsed_json() {
        let recorder = MetricsRecorder::new();
        let usage = serde_json::json!({"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7});
        recorder.record_usage(&usage, "m", "group-a");
        let families = recorder.registry.gather();
        let total = families.iter().find(|f| f.name() == "llm_total_token_usage").unwrap();
        assert_eq!(total.get_metric()[0].get_counter().value(), 7.0);
    }
}
