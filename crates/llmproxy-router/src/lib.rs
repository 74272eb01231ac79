mod handlers;
mod middleware;

use std::sync::Arc;

use axum::routing::{any, get};
use axum::{middleware as axum_middleware, Router};
use llmproxy_core::ProxyContext;

pub fn build_router(ctx: Arc<ProxyContext>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/llm/version", get(handlers::llm_version_handler))
        .route("/llm/v1/models", get(handlers::llm_models_handler))
        .route("/llm/{*path}", any(handlers::proxy_handler))
        .layer(axum_middleware::from_fn_with_state(ctx.clone(), middleware::record_http_metrics))
        .with_state(ctx)
}
