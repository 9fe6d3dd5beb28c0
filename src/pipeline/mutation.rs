//! MUTATION pipeline: route, dual-write dispatch, cache invalidation
//! (§4.F MUTATION).

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{self, CacheStore};
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::router;
use crate::shard::{MutationResponse, Query, ShardCoordinator};
use crate::split::SplitOverlay;

use super::events::InvalidationEvent;

pub struct MutationOutcome {
    pub response: MutationResponse,
    pub invalidations: Vec<InvalidationEvent>,
}

/// Routes `raw_sql` to its write shard set (primary plus any in-flight
/// split secondary), dispatches it, and on primary success invalidates the
/// table's cached query results on every target shard. A failed primary
/// never invalidates — the cache still reflects the last known-good state.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    cache: Arc<dyn CacheStore>,
    coordinator: Arc<ShardCoordinator>,
    policy_store: Arc<dyn PolicyStore>,
    overlay: SplitOverlay,
    shard_count: u32,
    tenant: &str,
    raw_sql: &str,
    params: &[Value],
    transaction_id: Option<&str>,
    now_ms: u64,
) -> Result<MutationOutcome> {
    let transpiled = crate::sql::transpile(raw_sql);
    let (table, write_shards) =
        router::resolve_write_targets(policy_store.as_ref(), &overlay, shard_count, tenant, &transpiled.sql).await?;

    let query = Query { sql: transpiled.sql, params: params.to_vec(), hints: None };
    let response = coordinator
        .dispatch_mutation(&write_shards, tenant, &query, transaction_id)
        .await?;

    let pattern = cache::invalidation_pattern_mutation(tenant, &table);
    cache.delete_by_pattern(&pattern).await;

    let invalidations = write_shards
        .iter()
        .map(|shard_id| InvalidationEvent::new(shard_id.clone(), 0, now_ms, tenant, &table))
        .collect();

    Ok(MutationOutcome { response, invalidations })
}
