//! Router (Component D) — resolves `(tenant, table)` to a shard via the
//! current policy, with a stable-hash fallback and a Split Orchestrator
//! overlay for in-flight resharding.

use crate::error::Result;
use crate::hash::hash_string;
use crate::policy::{Policy, PolicyStore};
use crate::split::overlay::SplitOverlay;

/// The outcome of routing a single operation: the shard that owns the
/// extracted table, and (for reads) the shard a caller should actually
/// address once the split overlay has had a say.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub table: String,
    /// The shard the policy (or fallback hash) resolves to, before any
    /// split overlay is applied.
    pub primary_shard: String,
}

/// Resolves policy routing for a `(tenant, table)` pair (§4.D steps 1-5).
/// Does not apply the split overlay — callers needing read/write shard
/// lists for dispatch should go through [`crate::split::overlay`] with this
/// decision's `primary_shard` as the `default`.
pub async fn route(policy_store: &dyn PolicyStore, shard_count: u32, tenant: &str, sql: &str) -> Result<RouteDecision> {
    let table = crate::sql::extract_table(sql);
    let policy = policy_store.current().await;
    let primary_shard = resolve_primary(&policy, shard_count, tenant, &table);
    Ok(RouteDecision { table, primary_shard })
}

/// Steps 3-5 of §4.D: tenant-pinned exact match, then range-prefix fallback,
/// then stable-hash fallback. Deterministic given `(policy.version, tenant,
/// table)` (Invariant, §4.D).
pub fn resolve_primary(policy: &Policy, shard_count: u32, tenant: &str, table: &str) -> String {
    if let Some(shard_id) = policy.tenants.get(tenant) {
        return shard_id.clone();
    }
    if let Some(shard_id) = policy.resolve_range(table) {
        return shard_id.to_string();
    }
    let n = shard_count.max(1);
    let bucket = hash_string(tenant) % n;
    format!("shard_{}", bucket)
}

/// Full route resolution including the Split Orchestrator's read overlay
/// (§4.D step 6) — the shard a SELECT should actually be sent to.
pub async fn resolve_read_target(
    policy_store: &dyn PolicyStore,
    overlay: &SplitOverlay,
    shard_count: u32,
    tenant: &str,
    sql: &str,
) -> Result<String> {
    let decision = route(policy_store, shard_count, tenant, sql).await?;
    Ok(overlay.resolve_read_shard(tenant, &decision.primary_shard).await)
}

/// Full route resolution including the Split Orchestrator's write overlay
/// (§4.D step 6, dual-write variant) — the ordered shard list a MUTATION or
/// DDL should fan out to, primary first.
pub async fn resolve_write_targets(
    policy_store: &dyn PolicyStore,
    overlay: &SplitOverlay,
    shard_count: u32,
    tenant: &str,
    sql: &str,
) -> Result<(String, Vec<String>)> {
    let decision = route(policy_store, shard_count, tenant, sql).await?;
    let targets = overlay.resolve_write_shards(tenant, &decision.primary_shard).await;
    Ok((decision.table, targets))
}
