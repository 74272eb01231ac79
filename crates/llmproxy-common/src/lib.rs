//! Shared configuration and error types used across the proxy workspace.
//!
//! `Settings` is the process-wide configuration surface: one struct, loaded
//! once at startup from environment variables (prefix `LLM_`) with CLI flags
//! taking precedence, mirroring the single `AppSettings` the original service
//! built on `pydantic_settings`.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Authorization mode for the legacy (single, non-registry) upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationType {
    #[default]
    None,
    ApiKey,
    Bearer,
    Cert,
}

impl AuthorizationType {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "APIKEY" => AuthorizationType::ApiKey,
            "BEARER" => AuthorizationType::Bearer,
            "CERT" => AuthorizationType::Cert,
            _ => AuthorizationType::None,
        }
    }
}

/// Process-wide settings, loaded from CLI flags (highest precedence) and
/// `LLM_`-prefixed environment variables (clap's `env` attribute handles the
/// CLI > ENV merge for each field individually).
#[derive(Parser, Debug, Clone)]
#[command(name = "llmproxy", about = "OpenAI-compatible LLM reverse proxy")]
pub struct Settings {
    #[arg(long, env = "LLM_APP_NAME", default_value = "llm-proxy")]
    pub app_name: String,

    #[arg(long, env = "LLM_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "LLM_PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "LLM_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "LLM_VERSION", default_value = "0.1.0")]
    pub version: String,

    // --- feature flags ---
    #[arg(long, env = "LLM_PROXY_ENABLED", default_value_t = false)]
    pub proxy_enabled: bool,

    #[arg(long, env = "LLM_PROMPT_HUB_ENABLED", default_value_t = false)]
    pub prompt_hub_enabled: bool,

    #[arg(long, env = "LLM_CHAIN_HUB_ENABLED", default_value_t = false)]
    pub chain_hub_enabled: bool,

    #[arg(long, env = "LLM_LLM_HUB_ENABLED", default_value_t = false)]
    pub llm_hub_enabled: bool,

    #[arg(long, env = "LLM_LLM_HUB_DIRECTORY", default_value = "data/llm_hub")]
    pub llm_hub_directory: String,

    // --- legacy (single-upstream) proxy tuning ---
    #[arg(long, env = "LLM_PROXY_TARGET_URL", default_value = "http://localhost:8001")]
    pub proxy_target_url: String,

    #[arg(long, env = "LLM_PROXY_MAX_RETRIES", default_value_t = 5)]
    pub proxy_max_retries: u32,

    #[arg(long, env = "LLM_PROXY_BASE_DELAY", default_value_t = 0.5)]
    pub proxy_base_delay: f64,

    #[arg(long, env = "LLM_PROXY_BACKOFF_FACTOR", default_value_t = 2.0)]
    pub proxy_backoff_factor: f64,

    #[arg(long, env = "LLM_PROXY_FAILURE_THRESHOLD", default_value_t = 0)]
    pub proxy_failure_threshold: u32,

    #[arg(long, env = "LLM_PROXY_RECOVERY_TIME", default_value_t = 30)]
    pub proxy_recovery_time: u64,

    #[arg(long, env = "LLM_PROXY_WINDOW_SIZE", default_value_t = 60)]
    pub proxy_window_size: u64,

    #[arg(
        long,
        env = "LLM_PROXY_EXCLUDE_HEADERS",
        default_value = "host,authorization,cookie,x-forwarded-*,jwt-*"
    )]
    pub proxy_exclude_headers: String,

    #[arg(long, env = "LLM_PROXY_VERIFY_SSL", default_value_t = true)]
    pub proxy_verify_ssl: bool,

    #[arg(long, env = "LLM_PROXY_CA_BUNDLE_PATH")]
    pub proxy_ca_bundle_path: Option<String>,

    #[arg(long, env = "LLM_PROXY_AUTHORIZATION_TYPE", default_value = "NONE")]
    pub proxy_authorization_type: String,

    #[arg(long, env = "LLM_PROXY_API_KEY")]
    pub proxy_api_key: Option<String>,

    #[arg(long, env = "LLM_PROXY_OIDC_AUTHORIZATION_URL")]
    pub proxy_oidc_authorization_url: Option<String>,

    #[arg(long, env = "LLM_PROXY_OIDC_CREDENTIALS")]
    pub proxy_oidc_credentials: Option<String>,

    #[arg(long, env = "LLM_PROXY_OIDC_SCOPE")]
    pub proxy_oidc_scope: Option<String>,

    #[arg(long, env = "LLM_PROXY_API_CERT_PATH")]
    pub proxy_api_cert_path: Option<String>,

    #[arg(long, env = "LLM_PROXY_API_CERT_KEY_PATH")]
    pub proxy_api_cert_key_path: Option<String>,

    // --- connection limits / per-phase timeouts ---
    #[arg(long, env = "LLM_MAX_CONNECTIONS", default_value_t = 100)]
    pub max_connections: usize,

    #[arg(long, env = "LLM_MAX_KEEPALIVE_CONNECTIONS", default_value_t = 20)]
    pub max_keepalive_connections: usize,

    #[arg(long, env = "LLM_PROXY_CONNECT_TIMEOUT", default_value_t = 10)]
    pub proxy_connect_timeout: u64,

    #[arg(long, env = "LLM_PROXY_READ_TIMEOUT", default_value_t = 300)]
    pub proxy_read_timeout: u64,

    #[arg(long, env = "LLM_PROXY_WRITE_TIMEOUT", default_value_t = 30)]
    pub proxy_write_timeout: u64,

    #[arg(long, env = "LLM_PROXY_POOL_TIMEOUT")]
    pub proxy_pool_timeout: Option<u64>,

    // --- tracing sink ---
    #[arg(long, env = "LLM_TRACING_ENABLED", default_value_t = false)]
    pub tracing_enabled: bool,

    #[arg(long, env = "LLM_TRACING_LOG_IO", default_value_t = true)]
    pub tracing_log_io: bool,
}

impl Settings {
    pub fn authorization_type(&self) -> AuthorizationType {
        AuthorizationType::parse(&self.proxy_authorization_type)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_connect_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_write_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_type_parses_case_insensitively() {
        assert_eq!(AuthorizationType::parse("apikey"), AuthorizationType::ApiKey);
        assert_eq!(AuthorizationType::parse("BEARER"), AuthorizationType::Bearer);
        assert_eq!(AuthorizationType::parse("Cert"), AuthorizationType::Cert);
        assert_eq!(AuthorizationType::parse("nonsense"), AuthorizationType::None);
    }

    #[test]
    fn settings_defaults_match_original_service() {
        let settings = Settings::parse_from(["llmproxy"]);
        assert_eq!(settings.proxy_max_retries, 5);
        assert_eq!(settings.proxy_base_delay, 0.5);
        assert_eq!(settings.proxy_backoff_factor, 2.0);
        assert_eq!(settings.proxy_failure_threshold, 0);
        assert_eq!(settings.proxy_recovery_time, 30);
        assert_eq!(settings.proxy_window_size, 60);
        assert_eq!(settings.max_connections, 100);
        assert_eq!(settings.max_keepalive_connections, 20);
    }
}
