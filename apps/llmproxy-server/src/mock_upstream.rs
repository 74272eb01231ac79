//! A canned-response OpenAI-compatible server, used only as a test fixture
//! (`serve-mock-upstream`). Deliberately small: it exists to give integration
//! tests something to point `LLM_PROXY_TARGET_URL` at, not to simulate an
//! upstream faithfully.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::Path;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use rand::Rng;
use serde_json::{json, Value};

const CANNED_RESPONSES: &[&str] = &[
    "I'm 99% sure I know the answer... but let's pretend I don't.",
    "Hold on, let me ask my imaginary AI assistant... Oh wait, that's me!",
    "Interesting question! I'll just consult my vast database of... absolutely nothing.",
    "Great question! I'll get back to you in approximately never.",
    "I ran a deep analysis on your question... and decided to wing it.",
];

pub fn router() -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/v1/models", get(models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/fine_tuning/jobs", post(create_fine_tuning_job).get(list_fine_tuning_jobs))
        .route("/v1/models/{model}", delete(delete_model))
}

async fn status() -> Json<Value> {
    Json(json!({ "status": "Fake LLM is running" }))
}

async fn models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [
            { "id": "fake-model-id-0", "object": "model", "created": 1_686_935_002_u64, "owned_by": "fakerai" },
            { "id": "fake-model-id-1", "object": "model", "created": 1_686_935_002_u64, "owned_by": "fakerai" },
        ],
    }))
}

async fn chat_completions(Json(request): Json<Value>) -> Json<Value> {
    let response = CANNED_RESPONSES[rand::rng().random_range(0..CANNED_RESPONSES.len())];

    let prompt_words: usize = request
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .filter_map(|message| message.get("content").and_then(Value::as_str))
                .map(|content| content.split_whitespace().count())
                .sum()
        })
        .unwrap_or(0);
    let prompt_tokens = (prompt_words as f64 * 1.2) as u64;
    let completion_tokens = (response.split_whitespace().count() as f64 * 1.2) as u64;

    Json(json!({
        "id": format!("chatcmpl-{:012x}", now_secs()),
        "object": "chat.completion",
        "created": now_secs(),
        "model": request.get("model").and_then(Value::as_str).unwrap_or("fake-model-id-0"),
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": response },
            "finish_reason": "stop",
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens,
        },
    }))
}

async fn embeddings(Json(_request): Json<Value>) -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{ "object": "embedding", "embedding": [0.0023064255, -0.009327292, -0.0028842222], "index": 0 }],
        "model": "fake-embedding-001",
        "usage": { "prompt_tokens": 8, "total_tokens": 8 },
    }))
}

async fn create_fine_tuning_job() -> Json<Value> {
    Json(json!({
        "object": "fine_tuning.job",
        "id": "ftjob-abc123",
        "model": "fake-llm",
        "created_at": now_secs(),
        "status": "queued",
        "training_file": "file-abc123",
    }))
}

async fn list_fine_tuning_jobs() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [{
            "object": "fine_tuning.job",
            "id": "ftjob-abc123",
            "model": "fake-llm",
            "created_at": now_secs(),
            "status": "queued",
            "training_file": "file-abc123",
        }],
        "has_more": false,
    }))
}

async fn delete_model(Path(model): Path<String>) -> Json<Value> {
    Json(json!({ "id": format!("ft:model-name:{model}"), "object": "model", "deleted": true }))
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
