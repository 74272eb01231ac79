use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::extract::State;
use axum::routing::post;
use llmproxy_provider_core::token_cache::{TokenCache, TokenCacheConfig};

#[derive(Clone)]
struct Counter(Arc<AtomicUsize>);

async fn token_handler(State(counter): State<Counter>) -> Json<serde_json::Value> {
    counter.0.fetch_add(1, Ordering::SeqCst);
    Json(serde_json::json!({
        "access_token": "single-flight-token",
        "expires_at": (chrono_like_future_ms()),
    }))
}

fn chrono_like_future_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64;
    now_ms + 60_000
}

#[tokio::test]
async fn concurrent_get_token_calls_issue_one_upstream_request() {
    let counter = Counter(Arc::new(AtomicUsize::new(0)));
    let app = axum::Router::new().route("/token", post(token_handler)).with_state(counter.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let cache = Arc::new(TokenCache::new(TokenCacheConfig {
        oidc_url: format!("http://{addr}/token"),
        credentials: "dGVzdDp0ZXN0".to_string(),
        scope: "default".to_string(),
    }));
    let client = wreq::Client::new();

    let (first, second) = tokio::join!(
        cache.get_token(&client),
        cache.get_token(&client),
    );

    assert_eq!(first.unwrap(), "single-flight-token");
    assert_eq!(second.unwrap(), "single-flight-token");
    assert_eq!(counter.0.load(Ordering::SeqCst), 1);
}
