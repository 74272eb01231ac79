//! Per-request trace records and the opaque sink they're submitted to: a
//! small `Arc<dyn _>` interface with a no-op default, and an async `emit`
//! since a real sink is an external collaborator that may do its own I/O.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Emitted per completed upstream call to a chat/completions-style path.
#[derive(Debug, Clone, Default)]
pub struct TraceRecord {
    pub model: Option<String>,
    pub provider: Option<String>,
    pub input_body: String,
    pub output_body: String,
    pub status_code: u16,
    pub usage: Option<Value>,
    pub duration_ms: u64,
    pub group_id: String,
    pub is_streaming: bool,
}

#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn emit(&self, record: TraceRecord) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct NoopTraceSink;

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn emit(&self, _record: TraceRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Emits each record as a structured `tracing` event instead of forwarding
/// it anywhere external. The default sink when `LLM_TRACING_ENABLED=true`
/// and no dedicated collector is configured.
#[derive(Debug, Default)]
pub struct TracingTraceSink;

#[async_trait]
impl TraceSink for TracingTraceSink {
    async fn emit(&self, record: TraceRecord) -> anyhow::Result<()> {
        info!(
            model = record.model.as_deref().unwrap_or("unknown"),
            provider = record.provider.as_deref().unwrap_or("unknown"),
            status_code = record.status_code,
            duration_ms = record.duration_ms,
            group_id = %record.group_id,
            is_streaming = record.is_streaming,
            usage = ?record.usage,
            "upstream call completed"
        );
        Ok(())
    }
}

/// Wraps a [`TraceSink`] with the `log_io` redaction policy and a
/// catch-and-log contract: a failing sink must never affect the response
/// already sent to the client.
pub struct TraceSinkAdapter {
    inner: Arc<dyn TraceSink>,
    log_io: bool,
}

impl TraceSinkAdapter {
    pub fn new(inner: Arc<dyn TraceSink>, log_io: bool) -> Self {
        Self { inner, log_io }
    }

    pub async fn submit(&self, mut record: TraceRecord) {
        if !self.log_io {
            record.input_body.clear();
            record.output_body.clear();
        }
        if let Err(err) = self.inner.emit(record).await {
            warn!(error = %err, "trace sink failed to accept record");
        }
    }
}
