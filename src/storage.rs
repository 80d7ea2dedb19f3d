//! Client-side key/value storage with expiry.
//!
//! The basket and consent stores only need text values with a time-to-live,
//! so anything cookie-like can back them: a browser cookie jar, the request
//! cookies of an HTTP call, or the in-memory map used in tests.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Expiry used for every persisted storefront value.
pub const DEFAULT_EXPIRY_DAYS: i64 = 365;

pub fn default_expiry() -> Duration { Duration::days(DEFAULT_EXPIRY_DAYS) }

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String, ttl: Duration);
    fn remove(&mut self, key: &str);
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> Option<String> { (**self).get(key) }
    fn set(&mut self, key: &str, value: String, ttl: Duration) { (**self).set(key, value, ttl) }
    fn remove(&mut self, key: &str) { (**self).remove(key) }
}

#[derive(Clone, Debug)]
struct Entry { value: String, expires_at: DateTime<Utc> }

/// Process-local store. Expired entries read as absent.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn expires_at(&self, key: &str) -> Option<DateTime<Utc>> { self.entries.get(key).map(|e| e.expires_at) }

    pub fn len(&self) -> usize { self.entries.values().filter(|e| e.expires_at > Utc::now()).count() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).filter(|e| e.expires_at > Utc::now()).map(|e| e.value.clone())
    }

    fn set(&mut self, key: &str, value: String, ttl: Duration) {
        self.entries.insert(key.to_string(), Entry { value, expires_at: Utc::now() + ttl });
    }

    fn remove(&mut self, key: &str) { self.entries.remove(key); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut store = MemoryStore::new();
        store.set("basket-cookie", "[]".into(), default_expiry());
        assert_eq!(store.get("basket-cookie").as_deref(), Some("[]"));
        let expiry = store.expires_at("basket-cookie").unwrap();
        assert!(expiry > Utc::now() + Duration::days(364));
        store.remove("basket-cookie");
        assert!(store.get("basket-cookie").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expired_entries_are_absent() {
        let mut store = MemoryStore::new();
        store.set("consent", "{}".into(), Duration::zero());
        assert!(store.get("consent").is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_borrowed_store() {
        let mut store = MemoryStore::new();
        {
            let mut borrowed = &mut store;
            KeyValueStore::set(&mut borrowed, "k", "v".into(), default_expiry());
        }
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }
}
