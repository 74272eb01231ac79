pub mod clients;
pub mod context;
pub mod errors;
pub mod forwarders;
pub mod health;
pub mod http_bridge;
pub mod metrics;
pub mod model_version;
pub mod response;
pub mod retry;
pub mod trace;

pub use context::ProxyContext;
pub use errors::{ProxyError, ProxyResult};
pub use metrics::MetricsRecorder;
pub use response::{ExecutorResult, SyntheticError, UpstreamResponse};
pub use trace::{NoopTraceSink, TraceRecord, TraceSink, TraceSinkAdapter, TracingTraceSink};
