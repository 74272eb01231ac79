//! Produces the small header set a provider's auth mode contributes to an
//! outbound request.

use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::errors::ProviderResult;
use crate::provider::AuthConfig;
use crate::token_cache::TokenCache;

/// Builds the auth headers for `auth`. `token_cache` must be `Some` when
/// `auth` is `Bearer` (the registry/bootstrap wires this up per provider).
pub async fn build_auth_headers(
    auth: &AuthConfig,
    token_cache: Option<&TokenCache>,
    client: &wreq::Client,
    provider_prefix: &str,
) -> ProviderResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    match auth {
        AuthConfig::None | AuthConfig::Cert { .. } => {}
        AuthConfig::ApiKey { key } => {
            if key.is_empty() {
                warn!(provider = provider_prefix, "api key auth configured with empty key");
            } else {
                headers.insert(
                    HeaderName::from_static("x-api-key"),
                    HeaderValue::from_str(key).unwrap_or_else(|_| HeaderValue::from_static("")),
                );
            }
        }
        AuthConfig::Bearer { .. } => {
            let cache = token_cache.expect("bearer auth requires a token cache");
            let token = cache.get_token(client).await?;
            let value = format!("Bearer {token}");
            headers.insert(
                http::header::AUTHORIZATION,
                HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("")),
            );
        }
    }
    Ok(headers)
}
