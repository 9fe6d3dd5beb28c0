//! Shard Coordinator: stub cache, per-shard circuit breaker, dual-write
//! fanout, and batch grouping (§4.E).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::error::{Result, WorkerSqlError};

use super::{AdminProtocol, BatchOp, BatchResponse, DdlResponse, MutationResponse, Query, QueryResponse, ShardId};
use super::breaker::Breaker;

/// Lazily-populated registry of shard stubs and their breakers, one of each
/// per `shard_id` seen. Read-mostly after startup; no eviction, since the
/// set of shards is bounded by shard count (§5).
pub struct ShardCoordinator {
    stubs: RwLock<HashMap<ShardId, Arc<dyn AdminProtocol>>>,
    breakers: RwLock<HashMap<ShardId, Arc<Breaker>>>,
    failure_threshold: u32,
    recovery_ms: u64,
}

impl ShardCoordinator {
    pub fn new(failure_threshold: u32, recovery_ms: u64) -> Self {
        Self {
            stubs: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
            failure_threshold,
            recovery_ms,
        }
    }

    /// Registers the stub handle for `shard_id`. Idempotent: re-registering
    /// replaces the handle but not its breaker state.
    pub fn register_shard(&self, shard_id: impl Into<String>, stub: Arc<dyn AdminProtocol>) {
        self.stubs.write().expect("stubs lock poisoned").insert(shard_id.into(), stub);
    }

    fn stub(&self, shard_id: &str) -> Result<Arc<dyn AdminProtocol>> {
        self.stubs
            .read()
            .expect("stubs lock poisoned")
            .get(shard_id)
            .cloned()
            .ok_or_else(|| WorkerSqlError::NotFound(format!("shard '{}' not registered", shard_id)))
    }

    fn breaker(&self, shard_id: &str) -> Arc<Breaker> {
        if let Some(b) = self.breakers.read().expect("breakers lock poisoned").get(shard_id) {
            return b.clone();
        }
        let mut breakers = self.breakers.write().expect("breakers lock poisoned");
        breakers
            .entry(shard_id.to_string())
            .or_insert_with(|| Arc::new(Breaker::new(self.failure_threshold, self.recovery_ms)))
            .clone()
    }

    pub fn breaker_state(&self, shard_id: &str) -> super::BreakerState {
        self.breaker(shard_id).state()
    }

    /// Serializes every call to `shard_id` through its breaker:
    /// short-circuits with `ShardUnavailable` when Open, otherwise dispatches
    /// and feeds the outcome back into the breaker.
    pub async fn execute<T, Fut>(
        &self,
        shard_id: &str,
        op: impl FnOnce(Arc<dyn AdminProtocol>) -> Fut,
    ) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breaker(shard_id);
        if !breaker.admit() {
            return Err(WorkerSqlError::ShardUnavailable(shard_id.to_string()));
        }
        let stub = self.stub(shard_id)?;
        match op(stub).await {
            Ok(v) => {
                breaker.on_success();
                Ok(v)
            }
            Err(e) => {
                breaker.on_failure();
                Err(e)
            }
        }
    }

    pub async fn select(&self, shard_id: &str, tenant_id: &str, query: &Query) -> Result<QueryResponse> {
        let tenant_id = tenant_id.to_string();
        let query = query.clone();
        self.execute(shard_id, move |stub| async move { stub.query(&tenant_id, &query).await }).await
    }

    pub async fn ddl(&self, shard_id: &str, tenant_id: &str, query: &Query) -> Result<DdlResponse> {
        let tenant_id = tenant_id.to_string();
        let query = query.clone();
        self.execute(shard_id, move |stub| async move { stub.ddl(&tenant_id, &query).await }).await
    }

    pub async fn export(
        &self,
        shard_id: &str,
        tenant_id: &str,
        table: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<super::ExportPage> {
        let tenant_id = tenant_id.to_string();
        let table = table.to_string();
        let cursor = cursor.map(|c| c.to_string());
        self.execute(shard_id, move |stub| async move {
            stub.export(&tenant_id, &table, cursor.as_deref(), limit).await
        })
        .await
    }

    pub async fn import(
        &self,
        shard_id: &str,
        tenant_id: &str,
        table: &str,
        rows: Vec<serde_json::Value>,
    ) -> Result<()> {
        let tenant_id = tenant_id.to_string();
        let table = table.to_string();
        self.execute(shard_id, move |stub| async move { stub.import(&tenant_id, &table, rows).await }).await
    }

    pub async fn events(
        &self,
        shard_id: &str,
        after: u64,
        limit: u32,
        tenant_ids: &[String],
    ) -> Result<Vec<super::ShardEvent>> {
        let tenant_ids = tenant_ids.to_vec();
        self.execute(shard_id, move |stub| async move { stub.events(after, limit, &tenant_ids).await }).await
    }

    /// Dispatches a mutation to a single shard with no fanout — used by
    /// tail replay, which only ever targets the split's target shard.
    pub async fn mutation(
        &self,
        shard_id: &str,
        tenant_id: &str,
        query: &Query,
        transaction_id: Option<&str>,
    ) -> Result<MutationResponse> {
        let tenant_id = tenant_id.to_string();
        let query = query.clone();
        let txn = transaction_id.map(|s| s.to_string());
        self.execute(shard_id, move |stub| async move { stub.mutation(&tenant_id, &query, txn.as_deref()).await }).await
    }

    /// Dispatches a mutation to `write_shards` (primary first, per the
    /// Router/Split-overlay contract). The primary's result is authoritative;
    /// secondaries are awaited for completion but their bodies are not
    /// parsed, and a secondary failure never fails the request.
    pub async fn dispatch_mutation(
        &self,
        write_shards: &[ShardId],
        tenant_id: &str,
        query: &Query,
        transaction_id: Option<&str>,
    ) -> Result<MutationResponse> {
        let (primary, secondaries) = write_shards
            .split_first()
            .ok_or_else(|| WorkerSqlError::Internal("dispatch_mutation called with no target shards".to_string()))?;

        let tenant = tenant_id.to_string();
        let q = query.clone();
        let txn = transaction_id.map(|s| s.to_string());
        let primary_result = self
            .execute(primary, move |stub| async move { stub.mutation(&tenant, &q, txn.as_deref()).await })
            .await?;

        for secondary in secondaries {
            let tenant = tenant_id.to_string();
            let q = query.clone();
            let txn = transaction_id.map(|s| s.to_string());
            let sid = secondary.clone();
            let result = self
                .execute(&sid, move |stub| async move { stub.mutation(&tenant, &q, txn.as_deref()).await })
                .await;
            if let Err(e) = result {
                log::warn!("secondary shard '{}' dual-write failed (ignored): {}", sid, e);
            }
        }

        Ok(primary_result)
    }

    /// Groups `ops` by primary write shard and dispatches one batch RPC per
    /// group, aggregating `rows_affected`. Any group failure is the caller's
    /// responsibility to turn into `BatchFailed` (the coordinator stays a
    /// thin dispatch layer here; see `pipeline::batch`).
    pub async fn dispatch_batch(&self, shard_id: &str, tenant_id: &str, ops: &[BatchOp]) -> Result<BatchResponse> {
        let tenant_id = tenant_id.to_string();
        let ops = ops.to_vec();
        self.execute(shard_id, move |stub| async move { stub.mutation_batch(&tenant_id, &ops).await }).await
    }
}
