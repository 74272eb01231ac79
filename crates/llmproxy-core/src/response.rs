//! The tagged result the RetryExecutor hands back to a forwarder: either a
//! real upstream response to relay, or a synthetic error the executor itself
//! manufactured (breaker open, retries exhausted). Forwarders pattern-match
//! on this instead of the source's dynamic dispatch between raw/wrapped
//! response objects.

use bytes::Bytes;
use http::HeaderMap;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct SyntheticError {
    pub status: u16,
    pub body: Value,
}

impl SyntheticError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, body: serde_json::json!({ "error": message.into() }) }
    }
}

/// What one attempt (or the whole retry loop) produced.
#[derive(Debug, Clone)]
pub enum ExecutorResult {
    Upstream(UpstreamResponse),
    Synthetic(SyntheticError),
}

impl ExecutorResult {
    pub fn status(&self) -> u16 {
        match self {
            ExecutorResult::Upstream(resp) => resp.status,
            ExecutorResult::Synthetic(err) => err.status,
        }
    }
}
