//! Cache Store (Component A)
//!
//! Key/value materialized-query cache with TTL+SWR freshness semantics and
//! prefix delete. Writes are last-writer-wins; there is no cross-key
//! consistency. All operations degrade open: callers never see a cache
//! failure, only a miss.

mod keys;
mod memory;

pub use keys::{
    entity_key, idempotency_key, index_key, invalidation_pattern_ddl,
    invalidation_pattern_mutation, query_key,
};
pub use memory::MemoryCacheStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single cached entry. `data` is an opaque payload — the cache never
/// interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Vec<u8>,
    pub version: u64,
    pub fresh_until_ms: u64,
    pub swr_until_ms: u64,
    pub shard_id: String,
}

/// Freshness classification of an entry at a point in time. Derived, never
/// stored — the same entry can be Fresh at `t1` and Expired at `t2 > t1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    StaleButRevalidatable,
    Expired,
}

pub fn classify(entry: &CacheEntry, now_ms: u64) -> Freshness {
    if now_ms < entry.fresh_until_ms {
        Freshness::Fresh
    } else if now_ms < entry.swr_until_ms {
        Freshness::StaleButRevalidatable
    } else {
        Freshness::Expired
    }
}

pub fn is_fresh(entry: &CacheEntry, now_ms: u64) -> bool {
    classify(entry, now_ms) == Freshness::Fresh
}

pub fn is_stale_but_revalidatable(entry: &CacheEntry, now_ms: u64) -> bool {
    classify(entry, now_ms) == Freshness::StaleButRevalidatable
}

pub fn is_expired(entry: &CacheEntry, now_ms: u64) -> bool {
    classify(entry, now_ms) == Freshness::Expired
}

/// Storage backend abstraction for the cache. The in-memory implementation
/// (`MemoryCacheStore`) is the only one this crate ships; the trait exists
/// so an embedder can swap in a distributed KV without touching callers —
/// the kind of collaborator that "truly varies" per the design notes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    async fn set(&self, key: &str, data: Vec<u8>, ttl_ms: u64, swr_ms: u64, shard_id: &str, now_ms: u64);

    async fn delete(&self, key: &str);

    /// Deletes every key sharing `prefix` (a trailing `*` in the pattern
    /// means "all keys with this prefix"; bare prefixes behave the same
    /// way). Completes before returning — callers may rely on that.
    async fn delete_by_pattern(&self, prefix: &str);
}

/// Convenience helpers layered over `CacheStore` for the materialized-query
/// key scheme (§6).
pub async fn get_materialized(
    store: &dyn CacheStore,
    tenant: &str,
    table: &str,
    sql_normalized: &str,
    params: &[String],
) -> Option<CacheEntry> {
    let key = query_key(tenant, table, sql_normalized, params);
    store.get(&key).await
}

#[allow(clippy::too_many_arguments)]
pub async fn set_materialized(
    store: &dyn CacheStore,
    tenant: &str,
    table: &str,
    sql_normalized: &str,
    params: &[String],
    data: Vec<u8>,
    ttl_ms: u64,
    swr_ms: u64,
    shard_id: &str,
    now_ms: u64,
) {
    let key = query_key(tenant, table, sql_normalized, params);
    store.set(&key, data, ttl_ms, swr_ms, shard_id, now_ms).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fresh_until: u64, swr_until: u64) -> CacheEntry {
        CacheEntry {
            data: vec![],
            version: 1,
            fresh_until_ms: fresh_until,
            swr_until_ms: swr_until,
            shard_id: "shard_0".into(),
        }
    }

    #[test]
    fn freshness_classification_boundaries() {
        let e = entry(1000, 5000);
        assert_eq!(classify(&e, 500), Freshness::Fresh);
        assert_eq!(classify(&e, 1000), Freshness::StaleButRevalidatable);
        assert_eq!(classify(&e, 4999), Freshness::StaleButRevalidatable);
        assert_eq!(classify(&e, 5000), Freshness::Expired);
    }

    #[test]
    fn freshness_is_monotonic_non_increasing_over_time() {
        // Invariant 3: if fresh at t2 then fresh at t1 < t2.
        let e = entry(1000, 5000);
        for t2 in [1, 500, 999] {
            assert!(is_fresh(&e, t2));
            for t1 in 0..t2 {
                assert!(is_fresh(&e, t1));
            }
        }
    }
}
