//! In-memory Web Storage and cookie jar
//!
//! Native processes have neither `document.cookie` nor `sessionStorage`; these
//! keep the same contracts alive for the lifetime of the process.

use bridge_traits::{
    error::Result,
    storage::{CookieStore, KeyValueStorage},
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-scoped key-value storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the storage, e.g. with a `tokenUrl`/`jwtToken` pair.
    pub fn with_items<I, K, V>(items: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: RwLock::new(
                items
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(key);
        Ok(())
    }
}

/// Process-scoped cookie jar
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieJar {
    fn read(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }

    fn write(&self, name: &str, value: &str) -> Result<()> {
        self.cookies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn cookie_header(&self) -> Option<String> {
        let cookies = self
            .cookies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pairs.sort();
        Some(pairs.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::with_items([("tokenUrl", "/api")]);
        assert_eq!(storage.get_item("tokenUrl").as_deref(), Some("/api"));
        assert!(storage.get_item("jwtToken").is_none());

        storage.set_item("jwtToken", "abc").unwrap();
        assert_eq!(storage.len(), 2);

        storage.remove_item("tokenUrl").unwrap();
        assert!(!storage.has_item("tokenUrl"));
    }

    #[test]
    fn test_cookie_jar_header_value_is_sorted() {
        let jar = MemoryCookieJar::new();
        assert_eq!(jar.cookie_header(), None);

        jar.write("b", "2").unwrap();
        jar.write("a", "1").unwrap();

        assert_eq!(jar.read("a").as_deref(), Some("1"));
        assert_eq!(jar.cookie_header().as_deref(), Some("a=1; b=2"));
    }
}
