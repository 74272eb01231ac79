//! OIDC client-credentials token cache with single-flight refresh: the
//! refresh request runs while holding the cache's lock, so any concurrent
//! caller blocks on the same in-flight request instead of issuing its own.

use std::time::{SystemTime, UNIX_EPOCH};

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::{ProviderError, ProviderResult};

const EXPIRY_SAFETY_MARGIN_MS: i64 = 20_000;

#[derive(Debug, Clone)]
pub struct TokenCacheConfig {
    pub oidc_url: String,
    /// Pre-encoded `Basic` credentials (the base64 portion after "Basic ").
    pub credentials: String,
    pub scope: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at_ms: i64,
}

#[derive(Debug)]
pub struct TokenCache {
    config: TokenCacheConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(config: TokenCacheConfig) -> Self {
        Self { config, cached: Mutex::new(None) }
    }

    pub async fn get_token(&self, client: &wreq::Client) -> ProviderResult<String> {
        let mut guard = self.cached.lock().await;
        let now_ms = now_epoch_ms();
        if let Some(cached) = guard.as_ref() {
            if now_ms < cached.expires_at_ms {
                return Ok(cached.token.clone());
            }
        }

        let refreshed = self.fetch_token(client).await?;
        let token = refreshed.token.clone();
        *guard = Some(refreshed);
        Ok(token)
    }

    async fn fetch_token(&self, client: &wreq::Client) -> ProviderResult<CachedToken> {
        let body = format!("scope={}", self.config.scope);
        let response = client
            .post(&self.config.oidc_url)
            .header(AUTHORIZATION, format!("Basic {}", self.config.credentials))
            .header("RqUID", Uuid::new_v4().to_string())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| ProviderError::TokenRequest(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::TokenRequest(format!(
                "oidc endpoint returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| ProviderError::TokenRequest(err.to_string()))?;

        parse_token_response(&payload)
    }
}

fn parse_token_response(payload: &Value) -> ProviderResult<CachedToken> {
    let token = payload
        .get("access_token")
        .or_else(|| payload.get("tok"))
        .and_then(Value::as_str)
        .ok_or(ProviderError::TokenFieldMissing("access_token"))?
        .to_string();

    let upstream_expiry = payload
        .get("expires_at")
        .or_else(|| payload.get("exp"))
        .and_then(Value::as_i64)
        .ok_or(ProviderError::TokenFieldMissing("expires_at"))?;

    Ok(CachedToken { token, expires_at_ms: upstream_expiry - EXPIRY_SAFETY_MARGIN_MS })
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_primary_field_names() {
        let payload = json!({"access_token": "tok-a", "expires_at": 1_000_000_i64});
        let cached = parse_token_response(&payload).unwrap();
        assert_eq!(cached.token, "tok-a");
        assert_eq!(cached.expires_at_ms, 1_000_000 - EXPIRY_SAFETY_MARGIN_MS);
    }

    #[test]
    fn parses_fallback_field_names() {
        let payload = json!({"tok": "tok-b", "exp": 500_i64});
        let cached = parse_token_response(&payload).unwrap();
        assert_eq!(cached.token, "tok-b");
        assert_eq!(cached.expires_at_ms, 500 - EXPIRY_SAFETY_MARGIN_MS);
    }

    #[test]
    fn missing_token_field_is_fatal() {
        let payload = json!({"expires_at": 1_000});
        assert!(matches!(
            parse_token_response(&payload),
            Err(ProviderError::TokenFieldMissing("access_token"))
        ));
    }

    #[test]
    fn missing_expiry_field_is_fatal() {
        let payload = json!({"access_token": "tok-c"});
        assert!(matches!(
            parse_token_response(&payload),
            Err(ProviderError::TokenFieldMissing("expires_at"))
        ));
    }
}
