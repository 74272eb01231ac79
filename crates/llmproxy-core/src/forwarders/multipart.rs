//! Streams a multipart request body to upstream without buffering it
//! and without retries (multipart bodies aren't replayable either). Skips
//! the HTTP request-count/duration metrics and trace capture entirely —
//! that skip is enforced by the caller not invoking the metrics middleware
//! for this path, not by this module.

use bytes::Bytes;
use futures_util::Stream;
use http::HeaderMap;
use serde_json::Value;

const EXTRA_HOP_BY_HOP_HEADERS: [&str; 5] = ["content-length", "transfer-encoding", "connection", "expect", "host"];

pub struct MultipartOutcome {
    pub status: u16,
    pub body: Value,
}

/// Drops the headers multipart forwarding must never carry across, on top
/// of whatever `headers::sanitize` already removed.
pub fn strip_extra_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if EXTRA_HOP_BY_HOP_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

pub async fn forward<S>(client: &wreq::Client, method: http::Method, outbound_url: String, headers: HeaderMap, body_stream: S) -> MultipartOutcome
where
    S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
{
    let mut builder = client.request(crate::http_bridge::to_wreq_method(&method), &outbound_url);
    for (name, value) in headers.iter() {
        if let Ok(value_str) = value.to_str() {
            builder = builder.header(name.as_str(), value_str);
        }
    }
    builder = builder.body(wreq::Body::wrap_stream(body_stream));

    let response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            return MultipartOutcome {
                status: 502,
                body: serde_json::json!({ "error": { "status_code": 502, "message": err.to_string() } }),
            };
        }
    };

    let status = response.status().as_u16();
    let bytes = response.bytes().await.unwrap_or_default();
    let body = parse_best_effort(&bytes);
    MultipartOutcome { status, body }
}

fn parse_best_effort(bytes: &Bytes) -> Value {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        return value;
    }
    let text = String::from_utf8_lossy(bytes);
    if let Ok(value) = serde_json::from_str::<Value>(&text) {
        return value;
    }
    serde_json::json!({ "error": "Invalid JSON response" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderName, HeaderValue};

    #[test]
    fn strips_extra_hop_by_hop_headers_only() {
        let mut input = HeaderMap::new();
        input.insert(HeaderName::from_static("content-length"), HeaderValue::from_static("10"));
        input.insert(HeaderName::from_static("host"), HeaderValue::from_static("upstream"));
        input.insert(HeaderName::from_static("x-custom"), HeaderValue::from_static("keep"));
        let out = strip_extra_hop_by_hop(&input);
        assert!(out.get("content-length").is_none());
        assert!(out.get("host").is_none());
        assert_eq!(out.get("x-custom").unwrap(), "keep");
    }

    #[test]
    fn falls_back_to_error_body_on_unparsable_response() {
        let parsed = parse_best_effort(&Bytes::from_static(&[0xff, 0xfe]));
        assert_eq!(parsed["error"], "Invalid JSON response");
    }
}
