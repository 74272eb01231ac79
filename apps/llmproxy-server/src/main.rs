use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use llmproxy_common::Settings;
use llmproxy_core::{NoopTraceSink, ProxyContext, TracingTraceSink};
use llmproxy_provider_core::ProviderRegistry;

mod cli;
mod mock_upstream;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match cli::parse() {
        cli::Command::Serve(settings) => run_server(settings).await,
        cli::Command::ServeMockUpstream { host, port } => run_mock_upstream(host, port).await,
    }
}

async fn run_server(settings: Settings) -> anyhow::Result<()> {
    init_logging(&settings.log_level);

    let registry = if settings.llm_hub_enabled {
        ProviderRegistry::load_from_dir(Path::new(&settings.llm_hub_directory))
            .with_context(|| format!("loading provider registry from {}", settings.llm_hub_directory))?
    } else {
        ProviderRegistry::empty()
    };

    let trace_sink: Arc<dyn llmproxy_core::TraceSink> =
        if settings.tracing_enabled { Arc::new(TracingTraceSink) } else { Arc::new(NoopTraceSink) };

    let host = settings.host.clone();
    let port = settings.port;
    let ctx = Arc::new(ProxyContext::new(&settings, registry, trace_sink).context("building proxy context")?);
    let app = llmproxy_router::build_router(ctx);

    let bind = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "llm-proxy listening");
    axum::serve(listener, app).await.context("serving")?;
    Ok(())
}

async fn run_mock_upstream(host: String, port: u16) -> anyhow::Result<()> {
    init_logging("info");
    let app = mock_upstream::router();
    let bind = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&bind).await.with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "mock upstream listening");
    axum::serve(listener, app).await.context("serving mock upstream")?;
    Ok(())
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
