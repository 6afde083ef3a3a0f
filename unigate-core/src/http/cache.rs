//! Process-wide HTTP client cache
//!
//! Building a pooled client per request defeats connection reuse, so clients
//! are cached by every input that affects their construction. Keys never
//! embed the credential itself, only its fingerprint.

use crate::http::client::HttpClient;
use crate::providers::GatewayResult;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;
use tracing::debug;

/// Whether the caller drives the client from sync or async bindings
///
/// The two modes share nothing at runtime here, but they are distinct cache
/// entries so a blocking caller never observes an async caller's pool state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientMode {
    Sync,
    Async,
}

/// Cache key covering every parameter that shapes a client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Fingerprint of the API credential, never the credential itself
    pub credential_fingerprint: u64,
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub organization: Option<String>,
    pub mode: ClientMode,
}

impl ClientKey {
    fn cache_slot(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

fn cache() -> &'static RwLock<HashMap<u64, HttpClient>> {
    static CACHE: OnceLock<RwLock<HashMap<u64, HttpClient>>> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Return the cached client for a key, building one on first use.
///
/// A handle that has marked itself closed is evicted and replaced in the same
/// lookup, so callers always receive a live handle.
pub fn cached_client(key: &ClientKey) -> GatewayResult<HttpClient> {
    let slot = key.cache_slot();

    if let Ok(map) = cache().read() {
        if let Some(client) = map.get(&slot) {
            if !client.is_closed() {
                return Ok(client.clone());
            }
        }
    }

    let mut map = cache().write().map_err(|_| {
        crate::providers::GatewayError::Configuration("client cache lock poisoned".to_string())
    })?;

    // Another writer may have replaced the entry while we waited for the lock.
    if let Some(client) = map.get(&slot) {
        if !client.is_closed() {
            return Ok(client.clone());
        }
        debug!(base_url = %key.base_url, "evicting closed client");
        map.remove(&slot);
    }

    let client = HttpClient::new(Duration::from_millis(key.timeout_ms))?;
    map.insert(slot, client.clone());
    debug!(base_url = %key.base_url, timeout_ms = key.timeout_ms, "created pooled client");
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fingerprint: u64, base_url: &str) -> ClientKey {
        ClientKey {
            credential_fingerprint: fingerprint,
            base_url: base_url.to_string(),
            timeout_ms: 30_000,
            retry_count: 0,
            organization: None,
            mode: ClientMode::Async,
        }
    }

    #[test]
    fn test_same_key_reuses_client() {
        let k = key(11, "https://api.openai.com/v1");
        let a = cached_client(&k).unwrap();
        let b = cached_client(&k).unwrap();
        // Clones of one handle share the staleness flag.
        a.mark_closed();
        assert!(b.is_closed());
    }

    #[test]
    fn test_distinct_keys_get_distinct_clients() {
        let a = cached_client(&key(21, "https://api.openai.com/v1")).unwrap();
        let b = cached_client(&key(22, "https://api.openai.com/v1")).unwrap();
        a.mark_closed();
        assert!(!b.is_closed());
    }

    #[test]
    fn test_closed_client_replaced_on_lookup() {
        let k = key(31, "https://api.anthropic.com");
        let stale = cached_client(&k).unwrap();
        stale.mark_closed();
        let fresh = cached_client(&k).unwrap();
        assert!(!fresh.is_closed());
        // The stale handle stays closed; only the cache entry was replaced.
        assert!(stale.is_closed());
    }

    #[test]
    fn test_mode_is_part_of_the_key() {
        let sync_key = ClientKey {
            mode: ClientMode::Sync,
            ..key(41, "https://api.asi1.ai/v1")
        };
        let async_key = ClientKey {
            mode: ClientMode::Async,
            ..key(41, "https://api.asi1.ai/v1")
        };
        let a = cached_client(&sync_key).unwrap();
        let b = cached_client(&async_key).unwrap();
        a.mark_closed();
        assert!(!b.is_closed());
    }
}
