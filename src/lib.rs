//! WorkerSQL core — routing, caching, shard coordination, and online
//! shard-splitting for a MySQL-compatible edge SQL service.
//!
//! [`CoreState`] is the single typed container an embedder constructs once
//! and shares (via `Arc`) across request-handling tasks; there is no
//! free-floating global state.

pub mod cache;
pub mod config;
pub mod error;
pub mod hash;
pub mod pipeline;
pub mod policy;
pub mod router;
pub mod session;
pub mod shard;
pub mod split;
pub mod sql;

use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;

use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::pipeline::{BatchItem, BatchOutcome, DdlOutcome, MutationOutcome, SelectOutcome};
use crate::policy::{MemoryPolicyStore, Policy, PolicyStore};
use crate::session::SessionManager;
use crate::shard::ShardCoordinator;
use crate::split::{SplitOrchestrator, SplitOverlay};

/// Every component wired together behind a single value, constructed once
/// by the embedder and cloned as an `Arc` into request-handling tasks (§9
/// "Global mutable state").
pub struct CoreState {
    pub config: Arc<Config>,
    pub cache: Arc<dyn CacheStore>,
    pub policy_store: Arc<dyn PolicyStore>,
    pub coordinator: Arc<ShardCoordinator>,
    pub split: Arc<SplitOrchestrator>,
    pub sessions: Arc<SessionManager>,
    background: AsyncMutex<JoinSet<()>>,
}

impl CoreState {
    /// Builds a fresh `CoreState` from `config` and an initial routing
    /// policy. Shard stubs are registered separately via
    /// [`CoreState::coordinator`] — the library has no opinion on transport.
    pub fn new(config: Config, initial_policy: Policy) -> Self {
        let config = Arc::new(config);
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
        let policy_store: Arc<dyn PolicyStore> = Arc::new(MemoryPolicyStore::new(initial_policy));
        let coordinator = Arc::new(ShardCoordinator::new(config.circuit_failure_threshold, config.circuit_recovery_ms));
        let split = Arc::new(SplitOrchestrator::new(coordinator.clone(), policy_store.clone(), config.backfill_page_size));
        let sessions = Arc::new(SessionManager::new(config.session_idle_ttl_ms, config.session_max_txn_ms));

        Self {
            config,
            cache,
            policy_store,
            coordinator,
            split,
            sessions,
            background: AsyncMutex::new(JoinSet::new()),
        }
    }

    fn overlay(&self) -> SplitOverlay {
        self.split.overlay()
    }

    pub async fn select(&self, tenant: &str, sql: &str, params: &[serde_json::Value], now_ms: u64) -> Result<SelectOutcome> {
        pipeline::run_select(
            self.cache.clone(),
            self.coordinator.clone(),
            self.policy_store.clone(),
            self.overlay(),
            self.config.clone(),
            tenant,
            sql,
            params,
            now_ms,
        )
        .await
    }

    pub async fn mutation(
        &self,
        tenant: &str,
        sql: &str,
        params: &[serde_json::Value],
        transaction_id: Option<&str>,
        now_ms: u64,
    ) -> Result<MutationOutcome> {
        pipeline::run_mutation(
            self.cache.clone(),
            self.coordinator.clone(),
            self.policy_store.clone(),
            self.overlay(),
            self.config.shard_count,
            tenant,
            sql,
            params,
            transaction_id,
            now_ms,
        )
        .await
    }

    pub async fn ddl(&self, tenant: &str, sql: &str, now_ms: u64) -> Result<DdlOutcome> {
        pipeline::run_ddl(
            self.cache.clone(),
            self.coordinator.clone(),
            self.policy_store.clone(),
            self.overlay(),
            self.config.shard_count,
            tenant,
            sql,
            now_ms,
        )
        .await
    }

    pub async fn batch(
        &self,
        tenant: &str,
        items: &[BatchItem],
        idempotency_key: Option<&str>,
        now_ms: u64,
    ) -> Result<BatchOutcome> {
        pipeline::run_batch(
            self.cache.clone(),
            self.coordinator.clone(),
            self.policy_store.clone(),
            self.overlay(),
            self.config.shard_count,
            tenant,
            items,
            idempotency_key,
            self.config.batch_max_ops,
            self.config.batch_max_bytes,
            self.config.idempotency_ttl_ms,
            now_ms,
        )
        .await
    }

    /// Spawns `task` as background work (backfill loops, tail replay, the
    /// session reaper) and keeps the handle so [`CoreState::shutdown`] can
    /// drain it (§5 "spawn_background").
    pub async fn spawn_background<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.background.lock().await.spawn(task);
    }

    /// Awaits every outstanding background task. Best-effort: a task that
    /// panicked is logged and skipped rather than propagated.
    pub async fn shutdown(&self) {
        let mut set = self.background.lock().await;
        while let Some(result) = set.join_next().await {
            if let Err(e) = result {
                log::error!("background task panicked during shutdown: {}", e);
            }
        }
    }
}
