pub mod multipart;
pub mod nonstreaming;
pub mod streaming;

use bytes::Bytes;
use serde_json::Value;

/// Builds `base_url + "/" + path_suffix`, appending `query` verbatim if
/// non-empty. The query string is always carried through unmodified.
pub fn build_outbound_url(base_url: &str, path_suffix: &str, query: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let mut url = format!("{base}/{path_suffix}");
    if !query.is_empty() {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// If `body` JSON-decodes to an object whose `"model"` equals
/// `original_model`, rewrites it to `stripped_model`. Returns the body
/// unchanged (byte-for-byte) if it doesn't decode or doesn't match, so a
/// non-JSON or already-stripped body is never mangled. Used by multi-provider
/// routing to strip the `prefix/` portion before forwarding upstream.
pub fn rewrite_model_field(body: &Bytes, original_model: &str, stripped_model: &str) -> Bytes {
    let Ok(mut value) = serde_json::from_slice::<Value>(body) else {
        return body.clone();
    };
    let Some(object) = value.as_object_mut() else {
        return body.clone();
    };
    match object.get("model").and_then(Value::as_str) {
        Some(model) if model == original_model => {
            object.insert("model".to_string(), Value::String(stripped_model.to_string()));
            Bytes::from(value.to_string())
        }
        _ => body.clone(),
    }
}

pub fn group_id_from_header(headers: &http::HeaderMap) -> String {
    headers
        .get("x-group-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_url_appends_query_only_when_present() {
        assert_eq!(
            build_outbound_url("http://up.example", "v1/models", "limit=10&offset=0"),
            "http://up.example/v1/models?limit=10&offset=0"
        );
        assert_eq!(build_outbound_url("http://up.example", "v1/models", ""), "http://up.example/v1/models");
    }

    #[test]
    fn rewrites_matching_model_field_only() {
        let body = Bytes::from(r#"{"model":"test/mymodel","stream":false}"#);
        let rewritten = rewrite_model_field(&body, "test/mymodel", "mymodel");
        let value: Value = serde_json::from_slice(&rewritten).unwrap();
        assert_eq!(value["model"], "mymodel");

        let untouched = rewrite_model_field(&body, "other/model", "model");
        assert_eq!(untouched, body);
    }
}
