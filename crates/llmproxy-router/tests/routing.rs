use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use llmproxy_common::Settings;
use llmproxy_core::{NoopTraceSink, ProxyContext};
use llmproxy_provider_core::ProviderRegistry;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn spawn_upstream(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn settings_against(base_url: &str) -> Settings {
    Settings::parse_from(["llmproxy-server", "--proxy-target-url", base_url])
}

async fn build_ctx(base_url: &str) -> Arc<ProxyContext> {
    let settings = settings_against(base_url);
    Arc::new(ProxyContext::new(&settings, ProviderRegistry::empty(), Arc::new(NoopTraceSink)).unwrap())
}

#[tokio::test]
async fn query_string_is_preserved_end_to_end() {
    let upstream = Router::new().route(
        "/v1/models",
        get(|uri: axum::http::Uri| async move { Json(json!({ "query": uri.query().unwrap_or("") })) }),
    );
    let base_url = spawn_upstream(upstream).await;
    let ctx = build_ctx(&base_url).await;
    let app = llmproxy_router::build_router(ctx);

    let response = app
        .oneshot(Request::get("/llm/v1/models?limit=5&offset=10").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["query"], "limit=5&offset=10");
}

#[tokio::test]
async fn multipart_uploads_skip_http_metrics() {
    let upstream = Router::new()
        .route("/v1/files", axum::routing::post(|| async { Json(json!({ "id": "file-123" })) }))
        .route("/v1/models", get(|| async { Json(json!({ "object": "list", "data": [] })) }));
    let base_url = spawn_upstream(upstream).await;
    let ctx = build_ctx(&base_url).await;
    let metrics = ctx.metrics.clone();
    let app = llmproxy_router::build_router(ctx);

    // Baseline: a plain request is counted, proving the family would show up
    // if the multipart request below were not actually skipped.
    let baseline = app
        .clone()
        .oneshot(Request::get("/llm/v1/models").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(baseline.status(), StatusCode::OK);
    let text = metrics.gather_text().unwrap();
    assert!(text.contains("http_requests_total"), "baseline request must be counted: {text}");
    let count_after_baseline = count_metric_samples(&text);

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"purpose\"\r\n\r\nfine-tune\r\n--{boundary}--\r\n"
    );
    let request = Request::post("/llm/v1/files")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = metrics.gather_text().unwrap();
    assert_eq!(
        count_metric_samples(&text),
        count_after_baseline,
        "multipart requests must not add http_requests_total samples: {text}"
    );
}

fn count_metric_samples(text: &str) -> usize {
    text.lines().filter(|line| line.starts_with("http_requests_total")).count()
}
