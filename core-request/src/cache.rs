//! Response cache keyed by `url + serialize(params)`.
//!
//! Entries expire by wall-clock time from the injected [`Clock`]. Expired
//! entries stay in the map but are never returned; a later `set` for the
//! same key overwrites them. There is no other eviction.

use bridge_traits::Clock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// TTL applied when a cached request does not set `cache_control`.
pub const DEFAULT_CACHE_TTL_MS: u64 = 30_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    /// `None` never expires
    expires_at: Option<i64>,
    data: Value,
}

/// Process-local, TTL-bound store of business payloads.
pub struct RequestCache {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RequestCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key for a request: the URL followed by the JSON form of its
    /// parameters (`null` when there are none).
    pub fn cache_key(url: &str, params: Option<&Value>) -> String {
        let serialized = params
            .map(Value::to_string)
            .unwrap_or_else(|| "null".to_string());
        format!("{}{}", url, serialized)
    }

    /// Returns the cached data when the entry exists and has not expired.
    /// Hits leave the expiry untouched.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.unix_timestamp_millis();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        match entry.expires_at {
            Some(expires_at) if now >= expires_at => {
                trace!(key, "Cache entry expired");
                None
            }
            _ => Some(entry.data.clone()),
        }
    }

    /// Store `data` for `ttl_ms` milliseconds; `0` keeps it forever.
    pub fn set(&self, key: impl Into<String>, data: Value, ttl_ms: u64) {
        let expires_at = (ttl_ms > 0).then(|| {
            self.clock
                .unix_timestamp_millis()
                .saturating_add(i64::try_from(ttl_ms).unwrap_or(i64::MAX))
        });
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.into(), CacheEntry { expires_at, data });
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCache").field("len", &self.len()).finish()
    }
}
