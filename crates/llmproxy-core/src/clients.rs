//! Builds and caches one `wreq::Client` per provider. A client owns its own
//! connection pool, so providers must not share one — but building a client
//! is not free, so each provider's is built once and reused.

use std::collections::HashMap;
use std::sync::Mutex;

use llmproxy_provider_core::TimeoutConfig;

use crate::errors::{ProxyError, ProxyResult};

fn build_client(
    timeouts: &TimeoutConfig,
    verify_ssl: bool,
    max_connections: usize,
    max_keepalive_connections: usize,
) -> ProxyResult<wreq::Client> {
    let mut builder = wreq::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.write)
        .read_timeout(timeouts.read)
        .pool_max_idle_per_host(max_keepalive_connections.min(max_connections).max(1));
    if let Some(pool) = timeouts.pool {
        builder = builder.pool_idle_timeout(pool);
    }
    if !verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().map_err(|err| ProxyError::ClientBuild(err.to_string()))
}

/// Keeps one client per provider prefix (plus the legacy single-upstream
/// client under the key `"__legacy__"`), built lazily on first use.
pub struct ClientCache {
    clients: Mutex<HashMap<String, wreq::Client>>,
}

impl ClientCache {
    pub fn new() -> Self {
        Self { clients: Mutex::new(HashMap::new()) }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn get_or_build(
        &self,
        key: &str,
        timeouts: &TimeoutConfig,
        verify_ssl: bool,
        max_connections: usize,
        max_keepalive_connections: usize,
    ) -> ProxyResult<wreq::Client> {
        let mut guard = self.clients.lock().expect("client cache mutex poisoned");
        if let Some(client) = guard.get(key) {
            return Ok(client.clone());
        }
        let client = build_client(timeouts, verify_ssl, max_connections, max_keepalive_connections)?;
        guard.insert(key.to_string(), client.clone());
        Ok(client)
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new()
    }
}
