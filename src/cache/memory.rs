//! In-memory `CacheStore` implementation.
//!
//! Mirrors the shared-state-behind-a-lock shape the Sandstone engine uses
//! for its page table (`engines/sandstone/shared_state.rs`): a single
//! `RwLock<HashMap<...>>`, read-mostly, with writes taking the lock only
//! for the duration of the mutation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CacheEntry, CacheStore};

pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn matches_prefix(key: &str, prefix: &str) -> bool {
        let literal = prefix.strip_suffix('*').unwrap_or(prefix);
        key.starts_with(literal)
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().unwrap().get(key).cloned()
    }

    async fn set(&self, key: &str, data: Vec<u8>, ttl_ms: u64, swr_ms: u64, shard_id: &str, now_ms: u64) {
        let mut entries = self.entries.write().unwrap();
        let version = entries.get(key).map(|e| e.version + 1).unwrap_or(1);
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                version,
                fresh_until_ms: now_ms.saturating_add(ttl_ms),
                swr_until_ms: now_ms.saturating_add(swr_ms),
                shard_id: shard_id.to_string(),
            },
        );
    }

    async fn delete(&self, key: &str) {
        self.entries.write().unwrap().remove(key);
    }

    async fn delete_by_pattern(&self, prefix: &str) {
        let mut entries = self.entries.write().unwrap();
        entries.retain(|k, _| !Self::matches_prefix(k, prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryCacheStore::new();
        store.set("t1:q:users:abc", b"payload".to_vec(), 1000, 5000, "shard_0", 0).await;
        let e = store.get("t1:q:users:abc").await.unwrap();
        assert_eq!(e.data, b"payload");
        assert_eq!(e.fresh_until_ms, 1000);
        assert_eq!(e.swr_until_ms, 5000);
    }

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let store = MemoryCacheStore::new();
        assert!(store.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn set_bumps_version_on_overwrite() {
        let store = MemoryCacheStore::new();
        store.set("k", vec![1], 1000, 5000, "s", 0).await;
        store.set("k", vec![2], 1000, 5000, "s", 0).await;
        let e = store.get("k").await.unwrap();
        assert_eq!(e.version, 2);
        assert_eq!(e.data, vec![2]);
    }

    #[tokio::test]
    async fn delete_by_pattern_removes_matching_prefix_only() {
        let store = MemoryCacheStore::new();
        store.set("t1:q:users:a", vec![], 1000, 5000, "s", 0).await;
        store.set("t1:q:users:b", vec![], 1000, 5000, "s", 0).await;
        store.set("t1:q:orders:a", vec![], 1000, 5000, "s", 0).await;

        store.delete_by_pattern("t1:q:users:*").await;

        assert!(store.get("t1:q:users:a").await.is_none());
        assert!(store.get("t1:q:users:b").await.is_none());
        assert!(store.get("t1:q:orders:a").await.is_some());
    }

    #[tokio::test]
    async fn delete_by_pattern_without_trailing_star_behaves_as_prefix() {
        let store = MemoryCacheStore::new();
        store.set("t1:q:*", vec![], 1000, 5000, "s", 0).await;
        store.set("t1:q:users:a", vec![], 1000, 5000, "s", 0).await;
        store.delete_by_pattern("t1:q:*").await;
        assert!(store.get("t1:q:users:a").await.is_none());
    }

    #[tokio::test]
    async fn delete_removes_single_key() {
        let store = MemoryCacheStore::new();
        store.set("k", vec![], 1000, 5000, "s", 0).await;
        store.delete("k").await;
        assert!(store.get("k").await.is_none());
    }
}
