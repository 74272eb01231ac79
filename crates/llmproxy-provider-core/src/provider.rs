//! The provider record: everything needed to dispatch one upstream backend
//! composed into a single value (base URL, auth, timeouts, and the breaker
//! and token cache it owns).

use std::time::Duration;

use crate::breaker::{BreakerPolicy, CircuitBreaker};
use crate::token_cache::{TokenCache, TokenCacheConfig};

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
    pub pool: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_s: f64,
    pub backoff_factor: f64,
}

#[derive(Debug, Clone)]
pub enum AuthConfig {
    None,
    ApiKey { key: String },
    Bearer { oidc_url: String, credentials: String, scope: String },
    Cert { cert_path: String, key_path: String },
}

/// One upstream backend: owns its breaker and (if auth is `Bearer`) its
/// token cache. Destroying the record releases both; the registry holds no
/// back-references.
#[derive(Debug)]
pub struct ProviderRecord {
    pub prefix: String,
    pub base_url: String,
    pub auth: AuthConfig,
    pub models: Vec<String>,
    pub verify_ssl: bool,
    pub ca_bundle_path: Option<String>,
    pub timeouts: TimeoutConfig,
    pub retry_policy: RetryPolicy,
    pub breaker: CircuitBreaker,
    pub token_cache: Option<TokenCache>,
}

impl ProviderRecord {
    pub fn new(
        prefix: String,
        base_url: String,
        auth: AuthConfig,
        models: Vec<String>,
        verify_ssl: bool,
        ca_bundle_path: Option<String>,
        timeouts: TimeoutConfig,
        retry_policy: RetryPolicy,
        breaker_policy: BreakerPolicy,
    ) -> Self {
        let token_cache = match &auth {
            AuthConfig::Bearer { oidc_url, credentials, scope } => {
                Some(TokenCache::new(TokenCacheConfig {
                    oidc_url: oidc_url.clone(),
                    credentials: credentials.clone(),
                    scope: scope.clone(),
                }))
            }
            _ => None,
        };
        Self {
            prefix,
            base_url,
            auth,
            models,
            verify_ssl,
            ca_bundle_path,
            timeouts,
            retry_policy,
            breaker: CircuitBreaker::new(breaker_policy),
            token_cache,
        }
    }

    /// `prefix` is restricted to `[A-Za-z0-9_-]+`; `models` entries may not
    /// contain `/` (they are joined with the prefix as `prefix/model`).
    pub fn validate(&self) -> Result<(), String> {
        if self.prefix.is_empty()
            || !self.prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(format!("invalid prefix '{}'", self.prefix));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(format!("base_url '{}' is not absolute", self.base_url));
        }
        if let Some(bad) = self.models.iter().find(|m| m.contains('/')) {
            return Err(format!("model name '{bad}' must not contain '/'"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prefix: &str, models: &[&str]) -> ProviderRecord {
        ProviderRecord::new(
            prefix.to_string(),
            "https://upstream.example".to_string(),
            AuthConfig::None,
            models.iter().map(|m| m.to_string()).collect(),
            true,
            None,
            TimeoutConfig {
                connect: Duration::from_secs(10),
                read: Duration::from_secs(300),
                write: Duration::from_secs(30),
                pool: None,
            },
            RetryPolicy { max_retries: 5, base_delay_s: 0.5, backoff_factor: 2.0 },
            BreakerPolicy { failure_threshold: 0, recovery_s: 30, window_s: 60 },
        )
    }

    #[test]
    fn rejects_model_names_with_slash() {
        let rec = record("alpha", &["good", "bad/name"]);
        assert!(rec.validate().is_err());
    }

    #[test]
    fn rejects_invalid_prefix_characters() {
        let rec = record("alpha/beta", &["good"]);
        assert!(rec.validate().is_err());
    }

    #[test]
    fn accepts_well_formed_record() {
        let rec = record("alpha", &["good"]);
        assert!(rec.validate().is_ok());
    }
}
