//! DDL pipeline: route, dual-write dispatch, tenant-wide cache invalidation
//! (§4.F DDL). DDL invalidates every cached query for the tenant, not just
//! the affected table — a `CREATE INDEX` can change which plan a previously
//! cached SELECT should have used.

use std::sync::Arc;

use crate::cache::{self, CacheStore};
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::router;
use crate::shard::{DdlResponse, Query, ShardCoordinator};
use crate::split::SplitOverlay;

use super::events::InvalidationEvent;

pub struct DdlOutcome {
    pub response: DdlResponse,
    pub invalidations: Vec<InvalidationEvent>,
}

pub async fn execute(
    cache: Arc<dyn CacheStore>,
    coordinator: Arc<ShardCoordinator>,
    policy_store: Arc<dyn PolicyStore>,
    overlay: SplitOverlay,
    shard_count: u32,
    tenant: &str,
    raw_sql: &str,
    now_ms: u64,
) -> Result<DdlOutcome> {
    let transpiled = crate::sql::transpile(raw_sql);
    let (table, write_shards) =
        router::resolve_write_targets(policy_store.as_ref(), &overlay, shard_count, tenant, &transpiled.sql).await?;

    let query = Query { sql: transpiled.sql, params: vec![], hints: None };
    let (primary, secondaries) = write_shards.split_first().ok_or_else(|| {
        crate::error::WorkerSqlError::Internal("ddl dispatch called with no target shards".to_string())
    })?;
    let response = coordinator.ddl(primary, tenant, &query).await?;
    for secondary in secondaries {
        if let Err(e) = coordinator.ddl(secondary, tenant, &query).await {
            log::warn!("secondary shard '{}' dual-write DDL failed (ignored): {}", secondary, e);
        }
    }

    let pattern = cache::invalidation_pattern_ddl(tenant);
    cache.delete_by_pattern(&pattern).await;

    let invalidations = write_shards
        .iter()
        .map(|shard_id| InvalidationEvent::new(shard_id.clone(), 0, now_ms, tenant, &table))
        .collect();

    Ok(DdlOutcome { response, invalidations })
}
