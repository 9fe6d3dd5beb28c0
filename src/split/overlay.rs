//! The Router's only integration point with live split state (§4.G).
//! Shares the orchestrator's plan registry but never mutates it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Phase, SplitPlan};

/// Cheap-to-clone handle over the shared plan registry, handed to the
/// Router so read/write overlay decisions never need to go through the
/// orchestrator itself.
#[derive(Clone)]
pub struct SplitOverlay {
    pub(super) plans: Arc<RwLock<HashMap<String, SplitPlan>>>,
}

impl SplitOverlay {
    pub(super) fn new(plans: Arc<RwLock<HashMap<String, SplitPlan>>>) -> Self {
        Self { plans }
    }

    fn plan_for_tenant(&self, tenant: &str) -> Option<SplitPlan> {
        self.plans
            .read()
            .expect("split plan registry lock poisoned")
            .values()
            .find(|p| p.tenant_ids.iter().any(|t| t == tenant))
            .cloned()
    }

    /// Returns `default` unless a plan for `tenant` has reached `Completed`,
    /// in which case the target shard. Pre-cutover reads always stay on
    /// `default` (the source).
    pub async fn resolve_read_shard(&self, tenant: &str, default: &str) -> String {
        match self.plan_for_tenant(tenant) {
            Some(plan) if plan.phase == Phase::Completed => plan.target_shard,
            _ => default.to_string(),
        }
    }

    /// Returns `[default]` unless a plan for `tenant` is mid-split
    /// (`DualWrite..CutoverPending`), in which case `[default, target]`.
    /// Post-cutover: `[target]` only, since `default` (the old policy's
    /// answer) is now the stale shard.
    pub async fn resolve_write_shards(&self, tenant: &str, default: &str) -> Vec<String> {
        match self.plan_for_tenant(tenant) {
            Some(plan) => match plan.phase {
                Phase::DualWrite | Phase::Backfill | Phase::Tailing | Phase::CutoverPending => {
                    vec![default.to_string(), plan.target_shard]
                }
                Phase::Completed => vec![plan.target_shard],
                Phase::Planning | Phase::RolledBack => vec![default.to_string()],
            },
            None => vec![default.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::{BackfillState, BackfillStatus, TailState, TailStatus};

    fn plan_with_phase(phase: Phase) -> SplitPlan {
        SplitPlan {
            split_id: "split_1".to_string(),
            source_shard: "shard_0".to_string(),
            target_shard: "shard_3".to_string(),
            tenant_ids: vec!["t1".to_string()],
            phase,
            routing_version_at_start: 1,
            routing_version_cutover: None,
            dual_write_started_at_ms: None,
            backfill: BackfillState { status: BackfillStatus::Pending, started_at_ms: None, completed_at_ms: None, error: None, per_table_cursor: HashMap::new(), rows_copied: 0 },
            tail: TailState { status: TailStatus::Pending, last_event_id: None, last_event_ts_ms: None, error: None, caught_up: false },
            error_message: None,
        }
    }

    fn overlay_with(plan: SplitPlan) -> SplitOverlay {
        let mut map = HashMap::new();
        map.insert(plan.split_id.clone(), plan);
        SplitOverlay::new(Arc::new(RwLock::new(map)))
    }

    #[tokio::test]
    async fn pre_cutover_reads_stay_on_source() {
        for phase in [Phase::Planning, Phase::DualWrite, Phase::Backfill, Phase::Tailing, Phase::CutoverPending] {
            let overlay = overlay_with(plan_with_phase(phase));
            assert_eq!(overlay.resolve_read_shard("t1", "shard_0").await, "shard_0");
        }
    }

    #[tokio::test]
    async fn completed_reads_follow_target() {
        let overlay = overlay_with(plan_with_phase(Phase::Completed));
        assert_eq!(overlay.resolve_read_shard("t1", "shard_0").await, "shard_3");
    }

    #[tokio::test]
    async fn dual_write_phases_fan_out_to_both_shards() {
        for phase in [Phase::DualWrite, Phase::Backfill, Phase::Tailing, Phase::CutoverPending] {
            let overlay = overlay_with(plan_with_phase(phase));
            assert_eq!(overlay.resolve_write_shards("t1", "shard_0").await, vec!["shard_0".to_string(), "shard_3".to_string()]);
        }
    }

    #[tokio::test]
    async fn completed_writes_target_only() {
        let overlay = overlay_with(plan_with_phase(Phase::Completed));
        assert_eq!(overlay.resolve_write_shards("t1", "shard_0").await, vec!["shard_3".to_string()]);
    }

    #[tokio::test]
    async fn unrelated_tenant_is_unaffected() {
        let overlay = overlay_with(plan_with_phase(Phase::DualWrite));
        assert_eq!(overlay.resolve_read_shard("other", "shard_0").await, "shard_0");
        assert_eq!(overlay.resolve_write_shards("other", "shard_0").await, vec!["shard_0".to_string()]);
    }
}
