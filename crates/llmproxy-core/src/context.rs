//! Ties the process-wide values together: the legacy (single-upstream)
//! provider, the optional multi-provider registry, the shared metrics
//! recorder and trace sink, and the header denylist. One [`ProxyContext`] is
//! built once at startup and handed to every request handler, rather than
//! reaching for ambient global state.

use std::sync::Arc;
use std::time::Duration;

use llmproxy_common::{AuthorizationType, Settings};
use llmproxy_provider_core::{AuthConfig, BreakerPolicy, ProviderRecord, ProviderRegistry, RetryPolicy, TimeoutConfig};

use crate::clients::ClientCache;
use crate::errors::ProxyResult;
use crate::metrics::MetricsRecorder;
use crate::trace::{TraceSink, TraceSinkAdapter};

pub const LEGACY_CLIENT_KEY: &str = "__legacy__";

pub struct ProxyContext {
    pub legacy_provider: Arc<ProviderRecord>,
    pub registry: ProviderRegistry,
    pub client_cache: ClientCache,
    pub metrics: Arc<MetricsRecorder>,
    pub trace: Arc<TraceSinkAdapter>,
    pub denylist_patterns: Vec<String>,
    pub app_name: String,
    pub version: String,
    pub proxy_enabled: bool,
    pub prompt_hub_enabled: bool,
    pub chain_hub_enabled: bool,
    pub llm_hub_enabled: bool,
    pub max_connections: usize,
    pub max_keepalive_connections: usize,
}

impl ProxyContext {
    pub fn new(settings: &Settings, registry: ProviderRegistry, trace_sink: Arc<dyn TraceSink>) -> ProxyResult<Self> {
        let legacy_provider = Arc::new(build_legacy_provider(settings));
        Ok(Self {
            legacy_provider,
            registry,
            client_cache: ClientCache::new(),
            metrics: Arc::new(MetricsRecorder::new()),
            trace: Arc::new(TraceSinkAdapter::new(trace_sink, settings.tracing_log_io)),
            denylist_patterns: parse_denylist(&settings.proxy_exclude_headers),
            app_name: settings.app_name.clone(),
            version: settings.version.clone(),
            proxy_enabled: settings.proxy_enabled,
            prompt_hub_enabled: settings.prompt_hub_enabled,
            chain_hub_enabled: settings.chain_hub_enabled,
            llm_hub_enabled: settings.llm_hub_enabled,
            max_connections: settings.max_connections,
            max_keepalive_connections: settings.max_keepalive_connections,
        })
    }

    pub fn client_for(&self, provider: &ProviderRecord, cache_key: &str) -> ProxyResult<wreq::Client> {
        Ok(self.client_cache.get_or_build(
            cache_key,
            &provider.timeouts,
            provider.verify_ssl,
            self.max_connections,
            self.max_keepalive_connections,
        )?)
    }
}

fn parse_denylist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| pattern.to_ascii_lowercase())
        .collect()
}

fn build_legacy_provider(settings: &Settings) -> ProviderRecord {
    let auth = match settings.authorization_type() {
        AuthorizationType::None => AuthConfig::None,
        AuthorizationType::ApiKey => {
            AuthConfig::ApiKey { key: settings.proxy_api_key.clone().unwrap_or_default() }
        }
        AuthorizationType::Bearer => AuthConfig::Bearer {
            oidc_url: settings.proxy_oidc_authorization_url.clone().unwrap_or_default(),
            credentials: settings.proxy_oidc_credentials.clone().unwrap_or_default(),
            scope: settings.proxy_oidc_scope.clone().unwrap_or_default(),
        },
        AuthorizationType::Cert => AuthConfig::Cert {
            cert_path: settings.proxy_api_cert_path.clone().unwrap_or_default(),
            key_path: settings.proxy_api_cert_key_path.clone().unwrap_or_default(),
        },
    };

    ProviderRecord::new(
        "legacy".to_string(),
        settings.proxy_target_url.clone(),
        auth,
        Vec::new(),
        settings.proxy_verify_ssl,
        settings.proxy_ca_bundle_path.clone(),
        TimeoutConfig {
            connect: settings.connect_timeout(),
            read: settings.read_timeout(),
            write: settings.write_timeout(),
            pool: settings.proxy_pool_timeout.map(Duration::from_secs),
        },
        RetryPolicy {
            max_retries: settings.proxy_max_retries,
            base_delay_s: settings.proxy_base_delay,
            backoff_factor: settings.proxy_backoff_factor,
        },
        BreakerPolicy {
            failure_threshold: settings.proxy_failure_threshold,
            recovery_s: settings.proxy_recovery_time,
            window_s: settings.proxy_window_size,
        },
    )
}
