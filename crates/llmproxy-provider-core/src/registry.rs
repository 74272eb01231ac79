//! Loads provider records from a directory of JSON files and resolves
//! `"prefix/model"` strings against them.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, warn};

use crate::breaker::BreakerPolicy;
use crate::provider::{AuthConfig, ProviderRecord, RetryPolicy, TimeoutConfig};

#[derive(Debug, Deserialize)]
struct RawAuth {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    oidc_url: Option<String>,
    credentials: Option<String>,
    scope: Option<String>,
    api_key: Option<String>,
    cert_path: Option<String>,
    cert_key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTimeout {
    connect: Option<u64>,
    read: Option<u64>,
    write: Option<u64>,
    pool: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawProviderFile {
    prefix: Option<String>,
    base_url: Option<String>,
    auth: Option<RawAuth>,
    models: Option<Vec<String>>,
    #[serde(default = "default_true")]
    verify_ssl: bool,
    ca_bundle_path: Option<String>,
    timeout: Option<RawTimeout>,
    #[serde(default)]
    failure_threshold: u32,
    #[serde(default = "default_recovery_time")]
    recovery_time: u64,
    #[serde(default = "default_window_size")]
    window_size: u64,
    #[serde(default = "default_max_retries")]
    max_retries: u32,
    #[serde(default = "default_base_delay")]
    base_delay: f64,
    #[serde(default = "default_backoff_factor")]
    backoff_factor: f64,
}

fn default_true() -> bool {
    true
}
fn default_recovery_time() -> u64 {
    30
}
fn default_window_size() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    5
}
fn default_base_delay() -> f64 {
    0.5
}
fn default_backoff_factor() -> f64 {
    2.0
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<ProviderRecord>>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self { providers: HashMap::new() }
    }

    /// Loads every `*.json` file in `dir`, sorted by filename ascending so
    /// "first occurrence wins" is deterministic. Per-file problems (missing
    /// `prefix`, malformed JSON, invalid record, duplicate prefix) are
    /// logged and the file is skipped; they never abort the whole load.
    pub fn load_from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map(|ext| ext == "json").unwrap_or(false))
            .collect();
        entries.sort();

        let mut providers: HashMap<String, Arc<ProviderRecord>> = HashMap::new();
        let mut first_file_by_prefix: HashMap<String, String> = HashMap::new();

        for path in entries {
            let filename = path.display().to_string();
            let raw_text = match fs::read_to_string(&path) {
                Ok(text) => text,
                Err(err) => {
                    error!(file = %filename, error = %err, "failed to read provider file");
                    continue;
                }
            };
            let expanded = expand_env_vars(&raw_text);

            let value: Value = match serde_json::from_str(&expanded) {
                Ok(value) => value,
                Err(err) => {
                    error!(file = %filename, error = %err, "malformed provider json, skipping");
                    continue;
                }
            };

            if value.get("prefix").is_none() {
                continue;
            }

            let raw: RawProviderFile = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(err) => {
                    error!(file = %filename, error = %err, "invalid provider schema, skipping");
                    continue;
                }
            };

            let record = match build_record(raw) {
                Ok(record) => record,
                Err(reason) => {
                    error!(file = %filename, reason = %reason, "invalid provider record, skipping");
                    continue;
                }
            };

            if let Some(first_file) = first_file_by_prefix.get(&record.prefix) {
                error!(
                    file = %filename,
                    prefix = %record.prefix,
                    first_file = %first_file,
                    "duplicate provider prefix, keeping first occurrence"
                );
                continue;
            }

            first_file_by_prefix.insert(record.prefix.clone(), filename);
            providers.insert(record.prefix.clone(), Arc::new(record));
        }

        Ok(Self { providers })
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn get(&self, prefix: &str) -> Option<Arc<ProviderRecord>> {
        self.providers.get(prefix).cloned()
    }

    /// Splits on the first `/`; the remainder may contain further slashes.
    pub fn resolve(&self, model: &str) -> Option<(Arc<ProviderRecord>, String)> {
        let (prefix, rest) = model.split_once('/')?;
        let provider = self.providers.get(prefix)?.clone();
        Some((provider, rest.to_string()))
    }

    pub fn merged_models(&self) -> Value {
        let mut data = Vec::new();
        for provider in self.providers.values() {
            for model in &provider.models {
                data.push(json!({
                    "id": format!("{}/{}", provider.prefix, model),
                    "object": "model",
                    "owned_by": provider.prefix,
                    "created": 0,
                }));
            }
        }
        json!({ "object": "list", "data": data })
    }
}

fn build_record(raw: RawProviderFile) -> Result<ProviderRecord, String> {
    let prefix = raw.prefix.ok_or("missing prefix")?;
    let base_url = raw.base_url.ok_or("missing base_url")?;
    let models = raw.models.unwrap_or_default();

    let auth = match raw.auth {
        None => AuthConfig::None,
        Some(raw_auth) => match raw_auth.kind.as_deref().unwrap_or("NONE").to_ascii_uppercase().as_str() {
            "APIKEY" => AuthConfig::ApiKey { key: raw_auth.api_key.unwrap_or_default() },
            "BEARER" => AuthConfig::Bearer {
                oidc_url: raw_auth.oidc_url.ok_or("bearer auth missing oidc_url")?,
                credentials: raw_auth.credentials.ok_or("bearer auth missing credentials")?,
                scope: raw_auth.scope.unwrap_or_default(),
            },
            "CERT" => AuthConfig::Cert {
                cert_path: raw_auth.cert_path.ok_or("cert auth missing cert_path")?,
                key_path: raw_auth.cert_key_path.ok_or("cert auth missing cert_key_path")?,
            },
            _ => AuthConfig::None,
        },
    };

    let timeout = raw.timeout.unwrap_or(RawTimeout { connect: None, read: None, write: None, pool: None });
    let timeouts = TimeoutConfig {
        connect: Duration::from_secs(timeout.connect.unwrap_or(10)),
        read: Duration::from_secs(timeout.read.unwrap_or(300)),
        write: Duration::from_secs(timeout.write.unwrap_or(30)),
        pool: timeout.pool.map(Duration::from_secs),
    };

    let record = ProviderRecord::new(
        prefix,
        base_url,
        auth,
        models,
        raw.verify_ssl,
        raw.ca_bundle_path,
        timeouts,
        RetryPolicy {
            max_retries: raw.max_retries,
            base_delay_s: raw.base_delay,
            backoff_factor: raw.backoff_factor,
        },
        BreakerPolicy {
            failure_threshold: raw.failure_threshold,
            recovery_s: raw.recovery_time,
            window_s: raw.window_size,
        },
    );
    record.validate()?;
    Ok(record)
}

/// Expands `${NAME}` occurrences using the process environment; undefined
/// names expand to the empty string.
fn expand_env_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(close) = text[i + 2..].find('}') {
                let name = &text[i + 2..i + 2 + close];
                if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') && !name.is_empty() {
                    if let Ok(value) = std::env::var(name) {
                        out.push_str(&value);
                    } else {
                        warn!(name, "unset environment variable referenced in provider file");
                    }
                    i += 2 + close + 1;
                    continue;
                }
            }
        }
        out.push(text[i..].chars().next().unwrap());
        i += text[i..].chars().next().unwrap().len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_defined_and_blanks_undefined_vars() {
        unsafe {
            std::env::set_var("REGISTRY_TEST_VAR", "hello");
        }
        let expanded = expand_env_vars("{\"key\": \"${REGISTRY_TEST_VAR}-${REGISTRY_TEST_UNSET}\"}");
        assert_eq!(expanded, "{\"key\": \"hello-\"}");
    }

    #[test]
    fn resolve_splits_on_first_slash_only() {
        let raw_a = RawProviderFile {
            prefix: Some("a".to_string()),
            base_url: Some("https://a.example".to_string()),
            auth: None,
            models: Some(vec!["b".to_string()]),
            verify_ssl: true,
            ca_bundle_path: None,
            timeout: None,
            failure_threshold: 0,
            recovery_time: 30,
            window_size: 60,
            max_retries: 5,
            base_delay: 0.5,
            backoff_factor: 2.0,
        };
        let mut providers = HashMap::new();
        let record = build_record(raw_a).unwrap();
        providers.insert(record.prefix.clone(), Arc::new(record));
        let registry = ProviderRegistry { providers };

        let (provider, stripped) = registry.resolve("a/b/c").unwrap();
        assert_eq!(provider.prefix, "a");
        assert_eq!(stripped, "b/c");
        assert!(registry.resolve("unknown/x").is_none());
        assert!(registry.resolve("noSlash").is_none());
    }
}
