//! Batch pipeline: validates a set of write-only ops, applies size limits,
//! honors an idempotency key, groups by write shard, and dispatches one
//! batch RPC per group (§4.F BATCH).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{self, CacheStore};
use crate::error::{Result, WorkerSqlError};
use crate::policy::PolicyStore;
use crate::router;
use crate::shard::{BatchOp as ShardBatchOp, ShardCoordinator};
use crate::sql::Kind;
use crate::split::SplitOverlay;

/// A single item in a batch request, before routing.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchOutcome {
    pub success: bool,
    pub rows_affected: u64,
}

fn estimated_size(items: &[BatchItem]) -> usize {
    items.iter().map(|i| i.sql.len() + i.params.iter().map(|p| p.to_string().len()).sum::<usize>()).sum()
}

/// Rejects any item that does not classify as INSERT/UPDATE/DELETE after
/// transpilation — a batch is a write-only primitive (§4.F point 4, edge
/// case "mixed reads/writes").
fn validate_all_writes(items: &[BatchItem]) -> Result<()> {
    for item in items {
        let transpiled = crate::sql::transpile(&item.sql);
        match crate::sql::classify(&transpiled.sql)? {
            Kind::Insert | Kind::Update | Kind::Delete => {}
            Kind::Select | Kind::Ddl => {
                return Err(WorkerSqlError::InvalidInput(format!(
                    "batch item '{}' is not a write operation",
                    item.sql
                )));
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    cache: Arc<dyn CacheStore>,
    coordinator: Arc<ShardCoordinator>,
    policy_store: Arc<dyn PolicyStore>,
    overlay: SplitOverlay,
    shard_count: u32,
    tenant: &str,
    items: &[BatchItem],
    idempotency_key: Option<&str>,
    max_ops: usize,
    max_bytes: usize,
    idempotency_ttl_ms: u64,
    now_ms: u64,
) -> Result<BatchOutcome> {
    if let Some(key) = idempotency_key {
        let cache_key = cache::idempotency_key(tenant, key);
        if let Some(entry) = cache.get(&cache_key).await {
            if cache::is_fresh(&entry, now_ms) {
                if let Ok(outcome) = serde_json::from_slice::<BatchOutcome>(&entry.data) {
                    return Ok(outcome);
                }
            }
        }
    }

    if items.is_empty() {
        return Ok(BatchOutcome { success: true, rows_affected: 0 });
    }
    if items.len() > max_ops {
        return Err(WorkerSqlError::InvalidInput(format!(
            "batch has {} ops, exceeds limit of {}",
            items.len(),
            max_ops
        )));
    }
    if estimated_size(items) > max_bytes {
        return Err(WorkerSqlError::InvalidInput(format!("batch exceeds byte limit of {}", max_bytes)));
    }
    validate_all_writes(items)?;

    let mut groups: HashMap<String, Vec<ShardBatchOp>> = HashMap::new();
    let mut group_order: Vec<String> = Vec::new();
    for item in items {
        let transpiled = crate::sql::transpile(&item.sql);
        let (_, write_shards) =
            router::resolve_write_targets(policy_store.as_ref(), &overlay, shard_count, tenant, &transpiled.sql).await?;
        let primary = write_shards.first().cloned().ok_or_else(|| {
            WorkerSqlError::Internal("batch routing produced no write shards".to_string())
        })?;
        if !groups.contains_key(&primary) {
            group_order.push(primary.clone());
        }
        groups.entry(primary).or_default().push(ShardBatchOp { sql: transpiled.sql, params: item.params.clone() });
    }

    let mut rows_affected = 0u64;
    for shard_id in &group_order {
        let ops = groups.get(shard_id).expect("group just inserted");
        let resp = coordinator.dispatch_batch(shard_id, tenant, ops).await.map_err(|e| {
            WorkerSqlError::BatchFailed(format!("group for shard '{}' failed: {}", shard_id, e))
        })?;
        rows_affected += resp.rows_affected;
    }

    let outcome = BatchOutcome { success: true, rows_affected };

    if let Some(key) = idempotency_key {
        let cache_key = cache::idempotency_key(tenant, key);
        let bytes = serde_json::to_vec(&outcome).unwrap_or_default();
        cache.set(&cache_key, bytes, idempotency_ttl_ms, idempotency_ttl_ms, "", now_ms).await;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::policy::MemoryPolicyStore;
    use crate::shard::mock::MockShard;
    use std::collections::BTreeMap;

    fn setup() -> (Arc<dyn CacheStore>, Arc<ShardCoordinator>, Arc<dyn PolicyStore>, SplitOverlay, Arc<MockShard>) {
        let mut tenants = BTreeMap::new();
        tenants.insert("t1".to_string(), "shard_0".to_string());
        let policy = crate::policy::Policy::new(1, 0, tenants, vec![]);
        let policy_store: Arc<dyn PolicyStore> = Arc::new(MemoryPolicyStore::new(policy));

        let shard = Arc::new(MockShard::new());
        let coordinator = Arc::new(ShardCoordinator::new(5, 30_000));
        coordinator.register_shard("shard_0", shard.clone() as Arc<dyn crate::shard::AdminProtocol>);

        let orchestrator = crate::split::SplitOrchestrator::new(coordinator.clone(), policy_store.clone(), 200);
        let overlay = orchestrator.overlay();

        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        (cache, coordinator, policy_store, overlay, shard)
    }

    fn item(sql: &str) -> BatchItem {
        BatchItem { sql: sql.to_string(), params: vec![] }
    }

    #[tokio::test]
    async fn dispatches_grouped_ops_and_aggregates_rows() {
        let (cache, coordinator, policy_store, overlay, shard) = setup();
        let items = vec![item("INSERT INTO users VALUES (1)"), item("INSERT INTO users VALUES (2)")];
        let outcome = execute(cache, coordinator, policy_store, overlay, 4, "t1", &items, None, 500, 1_048_576, 300_000, 0)
            .await
            .unwrap();
        assert_eq!(outcome.rows_affected, 2);
        assert_eq!(shard.row_count("t1", "users"), 2);
    }

    #[tokio::test]
    async fn empty_batch_succeeds_with_zero_rows_and_no_shard_calls() {
        let (cache, coordinator, policy_store, overlay, shard) = setup();
        let outcome = execute(cache, coordinator, policy_store, overlay, 4, "t1", &[], None, 500, 1_048_576, 300_000, 0)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.rows_affected, 0);
        assert_eq!(shard.row_count("t1", "users"), 0);
    }

    #[tokio::test]
    async fn rejects_non_write_items() {
        let (cache, coordinator, policy_store, overlay, _shard) = setup();
        let items = vec![item("SELECT * FROM users")];
        let err = execute(cache, coordinator, policy_store, overlay, 4, "t1", &items, None, 500, 1_048_576, 300_000, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidInput");
    }

    #[tokio::test]
    async fn rejects_batch_over_max_ops() {
        let (cache, coordinator, policy_store, overlay, _shard) = setup();
        let items = vec![item("INSERT INTO users VALUES (1)"); 3];
        let err = execute(cache, coordinator, policy_store, overlay, 4, "t1", &items, None, 2, 1_048_576, 300_000, 0)
            .await
            .unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidInput");
    }

    #[tokio::test]
    async fn repeated_idempotency_key_short_circuits_dispatch() {
        let (cache, coordinator, policy_store, overlay, shard) = setup();
        let items = vec![item("INSERT INTO users VALUES (1)")];
        let first = execute(
            cache.clone(),
            coordinator.clone(),
            policy_store.clone(),
            overlay.clone(),
            4,
            "t1",
            &items,
            Some("key-1"),
            500,
            1_048_576,
            300_000,
            0,
        )
        .await
        .unwrap();
        assert_eq!(first.rows_affected, 1);

        let second = execute(cache, coordinator, policy_store, overlay, 4, "t1", &items, Some("key-1"), 500, 1_048_576, 300_000, 1000)
            .await
            .unwrap();
        assert_eq!(second.rows_affected, 1);
        assert_eq!(shard.row_count("t1", "users"), 1);
    }
}
