//! Split Orchestrator (Component G, "the hard part") — operates the
//! 7-phase state machine for an online shard split (§4.G, §3).

pub mod backfill;
pub mod overlay;
pub mod tail;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerSqlError};
use crate::policy::PolicyStore;
use crate::shard::ShardCoordinator;

pub use overlay::SplitOverlay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Planning,
    DualWrite,
    Backfill,
    Tailing,
    CutoverPending,
    Completed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackfillStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillState {
    pub status: BackfillStatus,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub error: Option<String>,
    pub per_table_cursor: HashMap<String, String>,
    pub rows_copied: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TailStatus {
    Pending,
    InProgress,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailState {
    pub status: TailStatus,
    pub last_event_id: Option<u64>,
    pub last_event_ts_ms: Option<u64>,
    pub error: Option<String>,
    pub caught_up: bool,
}

/// The persistent lifecycle record for one shard split (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    pub split_id: String,
    pub source_shard: String,
    pub target_shard: String,
    pub tenant_ids: Vec<String>,
    pub phase: Phase,
    pub routing_version_at_start: u64,
    pub routing_version_cutover: Option<u64>,
    pub dual_write_started_at_ms: Option<u64>,
    pub backfill: BackfillState,
    pub tail: TailState,
    pub error_message: Option<String>,
}

/// Summary exposed to operators/admin tooling (§4.G "Metrics").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub split_id: String,
    pub source: String,
    pub target: String,
    pub phase: Phase,
    pub rows_copied: u64,
    pub backfill_status: BackfillStatus,
    pub tail_status: TailStatus,
    pub tenants: Vec<String>,
}

/// The tables a split covers. The orchestrator has no schema catalog of its
/// own; callers (the demo binary, or an admin API) supply the table list a
/// split should backfill.
pub type TableList = Vec<String>;

pub struct SplitOrchestrator {
    plans: Arc<RwLock<HashMap<String, SplitPlan>>>,
    coordinator: Arc<ShardCoordinator>,
    policy_store: Arc<dyn PolicyStore>,
    page_size: u32,
}

impl SplitOrchestrator {
    pub fn new(coordinator: Arc<ShardCoordinator>, policy_store: Arc<dyn PolicyStore>, page_size: u32) -> Self {
        Self {
            plans: Arc::new(RwLock::new(HashMap::new())),
            coordinator,
            policy_store,
            page_size,
        }
    }

    /// Hands the Router a cheap-to-clone overlay handle over the same plan
    /// registry this orchestrator mutates.
    pub fn overlay(&self) -> SplitOverlay {
        SplitOverlay::new(self.plans.clone())
    }

    fn get_plan(&self, split_id: &str) -> Result<SplitPlan> {
        self.plans
            .read()
            .expect("split plan registry lock poisoned")
            .get(split_id)
            .cloned()
            .ok_or_else(|| WorkerSqlError::NotFound(format!("split plan '{}' not found", split_id)))
    }

    fn put_plan(&self, plan: SplitPlan) {
        self.plans.write().expect("split plan registry lock poisoned").insert(plan.split_id.clone(), plan);
    }

    /// Planning validations (§4.G): non-empty tenants, distinct shards, every
    /// tenant currently on `source_shard`, and no other active plan sharing
    /// `source_shard`.
    pub async fn plan_split(
        &self,
        split_id: impl Into<String>,
        source_shard: &str,
        target_shard: &str,
        tenant_ids: Vec<String>,
    ) -> Result<SplitPlan> {
        if tenant_ids.is_empty() {
            return Err(WorkerSqlError::InvalidPlan("tenant_ids must be non-empty".to_string()));
        }
        if source_shard == target_shard {
            return Err(WorkerSqlError::InvalidPlan("source_shard and target_shard must differ".to_string()));
        }

        let policy = self.policy_store.current().await;
        for t in &tenant_ids {
            let routed = policy.tenants.get(t).map(|s| s.as_str()).or_else(|| policy.resolve_range(t));
            if routed != Some(source_shard) {
                return Err(WorkerSqlError::InvalidPlan(format!(
                    "tenant '{}' does not currently route to source shard '{}'",
                    t, source_shard
                )));
            }
        }

        let active_on_source = self
            .plans
            .read()
            .expect("split plan registry lock poisoned")
            .values()
            .any(|p| p.source_shard == source_shard && !matches!(p.phase, Phase::Completed | Phase::RolledBack));
        if active_on_source {
            return Err(WorkerSqlError::InvalidPlan(format!(
                "an active split already targets source shard '{}'",
                source_shard
            )));
        }

        let plan = SplitPlan {
            split_id: split_id.into(),
            source_shard: source_shard.to_string(),
            target_shard: target_shard.to_string(),
            tenant_ids,
            phase: Phase::Planning,
            routing_version_at_start: policy.version,
            routing_version_cutover: None,
            dual_write_started_at_ms: None,
            backfill: BackfillState {
                status: BackfillStatus::Pending,
                started_at_ms: None,
                completed_at_ms: None,
                error: None,
                per_table_cursor: HashMap::new(),
                rows_copied: 0,
            },
            tail: TailState { status: TailStatus::Pending, last_event_id: None, last_event_ts_ms: None, error: None, caught_up: false },
            error_message: None,
        };
        self.put_plan(plan.clone());
        log::info!("split '{}' planned: {} -> {}", plan.split_id, plan.source_shard, plan.target_shard);
        Ok(plan)
    }

    pub async fn start_dual_write(&self, split_id: &str, now_ms: u64) -> Result<SplitPlan> {
        let mut plan = self.get_plan(split_id)?;
        if plan.phase != Phase::Planning {
            return Err(WorkerSqlError::InvalidPlan(format!(
                "split '{}' is in phase {:?}, expected Planning",
                split_id, plan.phase
            )));
        }
        plan.phase = Phase::DualWrite;
        plan.dual_write_started_at_ms = Some(now_ms);
        plan.error_message = None;
        self.put_plan(plan.clone());
        log::info!("split '{}' entered DualWrite", split_id);
        Ok(plan)
    }

    /// Runs backfill for `tables` to completion (single call drains every
    /// page; §4.G describes this as cooperative background work — the
    /// caller is expected to invoke this from a background task so it
    /// doesn't block foreground request handling).
    pub async fn run_backfill(&self, split_id: &str, tables: &TableList, now_ms: u64) -> Result<SplitPlan> {
        let mut plan = self.get_plan(split_id)?;
        if !matches!(plan.phase, Phase::DualWrite | Phase::Backfill) {
            return Err(WorkerSqlError::InvalidPlan(format!(
                "split '{}' is in phase {:?}, expected DualWrite or Backfill",
                split_id, plan.phase
            )));
        }
        plan.phase = Phase::Backfill;
        plan.backfill.status = BackfillStatus::InProgress;
        if plan.backfill.started_at_ms.is_none() {
            plan.backfill.started_at_ms = Some(now_ms);
        }
        self.put_plan(plan.clone());

        match backfill::run(&self.coordinator, &plan, tables, self.page_size).await {
            Ok(progress) => {
                plan.backfill.per_table_cursor = progress.per_table_cursor;
                plan.backfill.rows_copied += progress.rows_copied;
                plan.backfill.status = BackfillStatus::Completed;
                plan.backfill.completed_at_ms = Some(now_ms);
                plan.tail.status = TailStatus::Pending;
                plan.phase = Phase::Tailing;
                plan.error_message = None;
                self.put_plan(plan.clone());
                log::info!("split '{}' backfill complete: {} rows copied", split_id, plan.backfill.rows_copied);
                Ok(plan)
            }
            Err(e) => {
                plan.backfill.status = BackfillStatus::Failed;
                plan.backfill.error = Some(e.to_string());
                plan.error_message = Some(e.to_string());
                self.put_plan(plan.clone());
                log::warn!("split '{}' backfill failed: {}", split_id, e);
                Err(e)
            }
        }
    }

    /// Replays the source event log until caught up (§4.G Tailing row).
    /// Idempotent: events at or before the persisted watermark are skipped.
    pub async fn replay_tail(&self, split_id: &str, now_ms: u64) -> Result<SplitPlan> {
        let mut plan = self.get_plan(split_id)?;
        if !matches!(plan.phase, Phase::Tailing) {
            return Err(WorkerSqlError::InvalidPlan(format!(
                "split '{}' is in phase {:?}, expected Tailing",
                split_id, plan.phase
            )));
        }
        plan.tail.status = TailStatus::InProgress;
        self.put_plan(plan.clone());

        match tail::replay(&self.coordinator, &plan, self.page_size, now_ms).await {
            Ok(result) => {
                if let Some(id) = result.last_event_id {
                    plan.tail.last_event_id = Some(id);
                }
                if result.last_event_ts_ms.is_some() {
                    plan.tail.last_event_ts_ms = result.last_event_ts_ms;
                }
                plan.tail.caught_up = result.caught_up;
                plan.tail.status = TailStatus::Pending;
                plan.error_message = None;
                if result.caught_up {
                    plan.phase = Phase::CutoverPending;
                }
                self.put_plan(plan.clone());
                Ok(plan)
            }
            Err(e) => {
                plan.tail.status = TailStatus::Failed;
                plan.tail.error = Some(e.to_string());
                plan.error_message = Some(e.to_string());
                self.put_plan(plan.clone());
                log::warn!("split '{}' tail replay failed: {}", split_id, e);
                Err(e)
            }
        }
    }

    /// Clones the current policy, reassigns every plan tenant to
    /// `target_shard`, and proposes it as the next version. On
    /// `VersionConflict` the plan remains `CutoverPending` for retry.
    pub async fn cutover(&self, split_id: &str) -> Result<SplitPlan> {
        let mut plan = self.get_plan(split_id)?;
        if plan.phase != Phase::CutoverPending {
            return Err(WorkerSqlError::InvalidPlan(format!(
                "split '{}' is in phase {:?}, expected CutoverPending",
                split_id, plan.phase
            )));
        }

        let current = self.policy_store.current().await;
        let mut tenants = current.tenants.clone();
        for t in &plan.tenant_ids {
            tenants.insert(t.clone(), plan.target_shard.clone());
        }
        let next_version = current.version + 1;
        let next = crate::policy::Policy::new(next_version, current.timestamp, tenants, current.ranges.clone());
        self.policy_store.propose(next).await?;

        plan.phase = Phase::Completed;
        plan.routing_version_cutover = Some(next_version);
        plan.error_message = None;
        self.put_plan(plan.clone());
        log::info!("split '{}' cutover complete at policy version {}", split_id, next_version);
        Ok(plan)
    }

    /// Resets routing to `routing_version_at_start`'s content (as a new
    /// version) and marks the plan `RolledBack`. Rejected once `Completed`
    /// (terminal, per the Boundary behaviors in §8).
    pub async fn rollback(&self, split_id: &str) -> Result<SplitPlan> {
        let mut plan = self.get_plan(split_id)?;
        if plan.phase == Phase::Completed {
            return Err(WorkerSqlError::InvalidPlan(format!("split '{}' already completed; rollback rejected", split_id)));
        }
        if plan.phase == Phase::RolledBack {
            return Ok(plan);
        }

        let start = self
            .policy_store
            .at_version(plan.routing_version_at_start)
            .await
            .ok_or_else(|| WorkerSqlError::NotFound(format!("policy version {} no longer retained", plan.routing_version_at_start)))?;
        let current = self.policy_store.current().await;
        let reset = crate::policy::Policy::new(current.version + 1, start.timestamp, start.tenants, start.ranges);
        self.policy_store.propose(reset).await?;

        plan.phase = Phase::RolledBack;
        plan.backfill.per_table_cursor.clear();
        plan.backfill.rows_copied = 0;
        plan.tail.caught_up = false;
        plan.error_message = None;
        self.put_plan(plan.clone());
        log::info!("split '{}' rolled back to routing version {}", split_id, plan.routing_version_at_start);
        Ok(plan)
    }

    pub fn metrics(&self, split_id: &str) -> Result<SplitMetrics> {
        let plan = self.get_plan(split_id)?;
        Ok(SplitMetrics {
            split_id: plan.split_id,
            source: plan.source_shard,
            target: plan.target_shard,
            phase: plan.phase,
            rows_copied: plan.backfill.rows_copied,
            backfill_status: plan.backfill.status,
            tail_status: plan.tail.status,
            tenants: plan.tenant_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::MemoryPolicyStore;
    use crate::shard::mock::MockShard;
    use std::collections::BTreeMap;

    fn orchestrator_with_tenant_on(source: &str) -> (SplitOrchestrator, Arc<MemoryPolicyStore>) {
        let mut tenants = BTreeMap::new();
        tenants.insert("t1".to_string(), source.to_string());
        let policy = crate::policy::Policy::new(1, 0, tenants, vec![]);
        let store = Arc::new(MemoryPolicyStore::new(policy));
        let coordinator = Arc::new(ShardCoordinator::new(5, 30_000));
        coordinator.register_shard("shard_0", Arc::new(MockShard::new()) as Arc<dyn crate::shard::AdminProtocol>);
        coordinator.register_shard("shard_3", Arc::new(MockShard::new()) as Arc<dyn crate::shard::AdminProtocol>);
        (SplitOrchestrator::new(coordinator, store.clone(), 200), store)
    }

    #[tokio::test]
    async fn plan_split_rejects_empty_tenants() {
        let (orch, _store) = orchestrator_with_tenant_on("shard_0");
        let err = orch.plan_split("s1", "shard_0", "shard_3", vec![]).await.unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidPlan");
    }

    #[tokio::test]
    async fn plan_split_rejects_tenant_not_on_source() {
        let (orch, _store) = orchestrator_with_tenant_on("shard_0");
        let err = orch
            .plan_split("s1", "shard_0", "shard_3", vec!["t1".to_string(), "t2".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidPlan");
    }

    #[tokio::test]
    async fn plan_split_rejects_same_source_and_target() {
        let (orch, _store) = orchestrator_with_tenant_on("shard_0");
        let err = orch.plan_split("s1", "shard_0", "shard_0", vec!["t1".to_string()]).await.unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidPlan");
    }

    #[tokio::test]
    async fn happy_path_split_reaches_completed() {
        let (orch, store) = orchestrator_with_tenant_on("shard_0");
        orch.plan_split("s1", "shard_0", "shard_3", vec!["t1".to_string()]).await.unwrap();
        orch.start_dual_write("s1", 1000).await.unwrap();
        let plan = orch.run_backfill("s1", &vec![], 2000).await.unwrap();
        assert_eq!(plan.phase, Phase::Tailing);
        let plan = orch.replay_tail("s1", 3000).await.unwrap();
        assert_eq!(plan.phase, Phase::CutoverPending);
        let plan = orch.cutover("s1").await.unwrap();
        assert_eq!(plan.phase, Phase::Completed);
        assert_eq!(plan.routing_version_cutover, Some(2));
        let policy = store.current().await;
        assert_eq!(policy.tenants.get("t1").map(|s| s.as_str()), Some("shard_3"));
    }

    #[tokio::test]
    async fn rollback_from_completed_is_rejected() {
        let (orch, _store) = orchestrator_with_tenant_on("shard_0");
        orch.plan_split("s1", "shard_0", "shard_3", vec!["t1".to_string()]).await.unwrap();
        orch.start_dual_write("s1", 1000).await.unwrap();
        orch.run_backfill("s1", &vec![], 2000).await.unwrap();
        orch.replay_tail("s1", 3000).await.unwrap();
        orch.cutover("s1").await.unwrap();
        let err = orch.rollback("s1").await.unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidPlan");
    }

    #[tokio::test]
    async fn rollback_mid_backfill_restores_source_routing() {
        let (orch, store) = orchestrator_with_tenant_on("shard_0");
        orch.plan_split("s1", "shard_0", "shard_3", vec!["t1".to_string()]).await.unwrap();
        orch.start_dual_write("s1", 1000).await.unwrap();
        let plan = orch.rollback("s1").await.unwrap();
        assert_eq!(plan.phase, Phase::RolledBack);
        let policy = store.current().await;
        assert_eq!(policy.tenants.get("t1").map(|s| s.as_str()), Some("shard_0"));
    }

    #[tokio::test]
    async fn second_plan_on_same_source_is_rejected_while_active() {
        let (orch, _store) = orchestrator_with_tenant_on("shard_0");
        orch.plan_split("s1", "shard_0", "shard_3", vec!["t1".to_string()]).await.unwrap();
        let err = orch.plan_split("s2", "shard_0", "shard_3", vec!["t1".to_string()]).await.unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidPlan");
    }
}
