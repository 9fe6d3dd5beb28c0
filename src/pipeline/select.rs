//! SELECT pipeline: Strong / Bounded / Cached (stale-while-revalidate)
//! consistency modes (§4.F SELECT).

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{self, CacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::policy::PolicyStore;
use crate::shard::{Query, ShardCoordinator};
use crate::sql::{self, Consistency};
use crate::split::SplitOverlay;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOutcome {
    pub data: Value,
    pub cached: bool,
    pub shard_id: String,
}

fn params_key(params: &[Value]) -> Vec<String> {
    params.iter().map(|v| v.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
async fn fetch_and_cache(
    cache: &Arc<dyn CacheStore>,
    coordinator: &ShardCoordinator,
    shard_id: &str,
    tenant: &str,
    table: &str,
    sql: &str,
    sql_digest: &str,
    params: &[Value],
    ttl_ms: u64,
    swr_ms: u64,
    now_ms: u64,
) -> Result<Value> {
    let query = Query { sql: sql.to_string(), params: params.to_vec(), hints: None };
    let resp = coordinator.select(shard_id, tenant, &query).await?;
    let bytes = serde_json::to_vec(&resp.data).unwrap_or_default();
    let keys = params_key(params);
    cache::set_materialized(cache.as_ref(), tenant, table, sql_digest, &keys, bytes, ttl_ms, swr_ms, shard_id, now_ms).await;
    Ok(resp.data)
}

/// Runs a SELECT to completion under the resolved consistency mode.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    cache: Arc<dyn CacheStore>,
    coordinator: Arc<ShardCoordinator>,
    policy_store: Arc<dyn PolicyStore>,
    overlay: SplitOverlay,
    config: Arc<Config>,
    tenant: &str,
    raw_sql: &str,
    params: &[Value],
    now_ms: u64,
) -> Result<SelectOutcome> {
    let transpiled = sql::transpile(raw_sql);
    let table = sql::extract_table(&transpiled.sql);
    let table_cfg = config.table_config(&table);
    let sql_digest = sql::normalize_for_digest(&transpiled.sql);

    let mode = transpiled.hint.map(|h| h.consistency).unwrap_or(table_cfg.cache.mode);
    let shard_id = crate::router::resolve_read_target(
        policy_store.as_ref(),
        &overlay,
        config.shard_count,
        tenant,
        &transpiled.sql,
    )
    .await?;

    match mode {
        Consistency::Strong => {
            let query = Query { sql: transpiled.sql, params: params.to_vec(), hints: None };
            let resp = coordinator.select(&shard_id, tenant, &query).await?;
            Ok(SelectOutcome { data: resp.data, cached: false, shard_id })
        }
        Consistency::Bounded => {
            let params_keys = params_key(params);
            let cached = cache::get_materialized(cache.as_ref(), tenant, &table, &sql_digest, &params_keys).await;
            if let Some(entry) = &cached {
                if cache::is_fresh(entry, now_ms) {
                    let data: Value = serde_json::from_slice(&entry.data).unwrap_or(Value::Null);
                    return Ok(SelectOutcome { data, cached: true, shard_id });
                }
            }
            let data = fetch_and_cache(
                &cache,
                &coordinator,
                &shard_id,
                tenant,
                &table,
                &transpiled.sql,
                &sql_digest,
                params,
                table_cfg.cache.ttl_ms,
                table_cfg.cache.swr_ms,
                now_ms,
            )
            .await?;
            Ok(SelectOutcome { data, cached: false, shard_id })
        }
        Consistency::Weak => {
            let params_keys = params_key(params);
            let cached = cache::get_materialized(cache.as_ref(), tenant, &table, &sql_digest, &params_keys).await;
            if let Some(entry) = &cached {
                if cache::is_fresh(entry, now_ms) {
                    let data: Value = serde_json::from_slice(&entry.data).unwrap_or(Value::Null);
                    return Ok(SelectOutcome { data, cached: true, shard_id });
                }
                if cache::is_stale_but_revalidatable(entry, now_ms) {
                    let data: Value = serde_json::from_slice(&entry.data).unwrap_or(Value::Null);
                    let cache = cache.clone();
                    let coordinator = coordinator.clone();
                    let shard_id_bg = shard_id.clone();
                    let tenant = tenant.to_string();
                    let table = table.clone();
                    let sql_text = transpiled.sql.clone();
                    let sql_digest = sql_digest.clone();
                    let params_owned = params.to_vec();
                    let ttl_ms = table_cfg.cache.ttl_ms;
                    let swr_ms = table_cfg.cache.swr_ms;
                    tokio::spawn(async move {
                        if let Err(e) = fetch_and_cache(
                            &cache, &coordinator, &shard_id_bg, &tenant, &table, &sql_text, &sql_digest, &params_owned, ttl_ms, swr_ms, now_ms,
                        )
                        .await
                        {
                            log::warn!("background revalidation for '{}' failed: {}", table, e);
                        }
                    });
                    return Ok(SelectOutcome { data, cached: true, shard_id });
                }
            }
            let data = fetch_and_cache(
                &cache,
                &coordinator,
                &shard_id,
                tenant,
                &table,
                &transpiled.sql,
                &sql_digest,
                params,
                table_cfg.cache.ttl_ms,
                table_cfg.cache.swr_ms,
                now_ms,
            )
            .await?;
            Ok(SelectOutcome { data, cached: false, shard_id })
        }
    }
}
