//! Process-wide configuration (§6), with per-table overrides merged at
//! request time by the components that consult them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::sql::Consistency;

fn default_shard_count() -> u32 {
    4
}
fn default_cache_ttl_ms() -> u64 {
    30_000
}
fn default_cache_swr_ms() -> u64 {
    120_000
}
fn default_connection_ttl_ms() -> u64 {
    600_000
}
fn default_max_connections_per_shard() -> u32 {
    10
}
fn default_circuit_failure_threshold() -> u32 {
    5
}
fn default_circuit_recovery_ms() -> u64 {
    30_000
}
fn default_batch_max_ops() -> usize {
    500
}
fn default_batch_max_bytes() -> usize {
    1_048_576
}
fn default_session_idle_ttl_ms() -> u64 {
    600_000
}
fn default_session_max_txn_ms() -> u64 {
    300_000
}
fn default_backfill_page_size() -> u32 {
    200
}
fn default_idempotency_ttl_ms() -> u64 {
    300_000
}

/// Cache policy for a single table: how SELECTs against it are served.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TableCacheConfig {
    pub mode: Consistency,
    #[serde(default = "default_cache_ttl_ms")]
    pub ttl_ms: u64,
    #[serde(default = "default_cache_swr_ms")]
    pub swr_ms: u64,
}

impl Default for TableCacheConfig {
    fn default() -> Self {
        Self {
            mode: Consistency::Bounded,
            ttl_ms: default_cache_ttl_ms(),
            swr_ms: default_cache_swr_ms(),
        }
    }
}

/// Per-table policy overrides: cache behavior and primary key column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub cache: TableCacheConfig,
    #[serde(default = "default_pk")]
    pub pk: String,
}

fn default_pk() -> String {
    "id".to_string()
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { cache: TableCacheConfig::default(), pk: default_pk() }
    }
}

/// Process-wide configuration, read at init. Table-level entries in
/// `tables` are merged with `TableConfig::default()` for tables with no
/// explicit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_shard_count")]
    pub shard_count: u32,

    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_cache_swr_ms")]
    pub cache_swr_ms: u64,

    #[serde(default = "default_connection_ttl_ms")]
    pub connection_ttl_ms: u64,
    #[serde(default = "default_max_connections_per_shard")]
    pub max_connections_per_shard: u32,

    #[serde(default = "default_circuit_failure_threshold")]
    pub circuit_failure_threshold: u32,
    #[serde(default = "default_circuit_recovery_ms")]
    pub circuit_recovery_ms: u64,

    #[serde(default = "default_batch_max_ops")]
    pub batch_max_ops: usize,
    #[serde(default = "default_batch_max_bytes")]
    pub batch_max_bytes: usize,

    #[serde(default = "default_session_idle_ttl_ms")]
    pub session_idle_ttl_ms: u64,
    #[serde(default = "default_session_max_txn_ms")]
    pub session_max_txn_ms: u64,

    #[serde(default = "default_backfill_page_size")]
    pub backfill_page_size: u32,

    #[serde(default = "default_idempotency_ttl_ms")]
    pub idempotency_ttl_ms: u64,

    #[serde(default)]
    pub tables: HashMap<String, TableConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: default_shard_count(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_swr_ms: default_cache_swr_ms(),
            connection_ttl_ms: default_connection_ttl_ms(),
            max_connections_per_shard: default_max_connections_per_shard(),
            circuit_failure_threshold: default_circuit_failure_threshold(),
            circuit_recovery_ms: default_circuit_recovery_ms(),
            batch_max_ops: default_batch_max_ops(),
            batch_max_bytes: default_batch_max_bytes(),
            session_idle_ttl_ms: default_session_idle_ttl_ms(),
            session_max_txn_ms: default_session_max_txn_ms(),
            backfill_page_size: default_backfill_page_size(),
            idempotency_ttl_ms: default_idempotency_ttl_ms(),
            tables: HashMap::new(),
        }
    }
}

impl Config {
    /// Table config merged with defaults: an explicit entry for `table`
    /// wins in full; an absent entry falls back to `TableConfig::default()`.
    pub fn table_config(&self, table: &str) -> TableConfig {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let c = Config::default();
        assert_eq!(c.shard_count, 4);
        assert_eq!(c.cache_ttl_ms, 30_000);
        assert_eq!(c.cache_swr_ms, 120_000);
        assert_eq!(c.connection_ttl_ms, 600_000);
        assert_eq!(c.max_connections_per_shard, 10);
        assert_eq!(c.circuit_failure_threshold, 5);
        assert_eq!(c.circuit_recovery_ms, 30_000);
        assert_eq!(c.batch_max_ops, 500);
        assert_eq!(c.batch_max_bytes, 1_048_576);
    }

    #[test]
    fn table_config_falls_back_to_default() {
        let c = Config::default();
        let tc = c.table_config("unknown_table");
        assert_eq!(tc.pk, "id");
    }

    #[test]
    fn table_config_honors_explicit_entry() {
        let mut c = Config::default();
        c.tables.insert(
            "users".to_string(),
            TableConfig { cache: TableCacheConfig { mode: Consistency::Strong, ttl_ms: 1000, swr_ms: 2000 }, pk: "user_id".to_string() },
        );
        let tc = c.table_config("users");
        assert_eq!(tc.pk, "user_id");
        assert_eq!(tc.cache.mode, Consistency::Strong);
    }
}
