//! Tail replay: applies the source event-log suffix to the target after
//! backfill, so the target catches up with writes that landed on the
//! source while backfill was copying (§4.G Tailing row).

use crate::error::Result;
use crate::shard::{EventType, Query, ShardCoordinator};
use crate::sql::Kind;

use super::SplitPlan;

pub struct TailProgress {
    pub last_event_id: Option<u64>,
    pub last_event_ts_ms: Option<u64>,
    pub caught_up: bool,
}

/// Fetches one page of events after the persisted watermark and applies
/// each to the target: DDL to `/ddl`, non-SELECT queries to `/mutation`,
/// SELECTs are skipped (reads never need replaying). A batch smaller than
/// `page_size` means the tail has caught up.
pub async fn replay(coordinator: &ShardCoordinator, plan: &SplitPlan, page_size: u32, _now_ms: u64) -> Result<TailProgress> {
    let after = plan.tail.last_event_id.unwrap_or(0);
    let events = coordinator.events(&plan.source_shard, after, page_size, &plan.tenant_ids).await?;

    let mut last_event_id = plan.tail.last_event_id;
    let mut last_event_ts_ms = plan.tail.last_event_ts_ms;
    let batch_len = events.len();

    for event in &events {
        // Idempotency guard (§8 Invariant 5 / Boundary behaviors): never
        // re-apply an event at or before the watermark, even if the shard's
        // `after` filtering were ever loosened.
        if event.id <= after {
            continue;
        }

        match event.event_type {
            EventType::Ddl => {
                let query = Query { sql: event.sql.clone(), params: event.params.clone(), hints: None };
                coordinator.ddl(&plan.target_shard, &event.tenant_id, &query).await?;
            }
            EventType::Query => {
                if !matches!(crate::sql::classify(&event.sql), Ok(Kind::Select)) {
                    let query = Query { sql: event.sql.clone(), params: event.params.clone(), hints: None };
                    coordinator.mutation(&plan.target_shard, &event.tenant_id, &query, None).await?;
                }
            }
        }

        last_event_id = Some(event.id);
        last_event_ts_ms = Some(event.ts_ms);
        tokio::task::yield_now().await;
    }

    let caught_up = (batch_len as u32) < page_size;
    Ok(TailProgress { last_event_id, last_event_ts_ms, caught_up })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::mock::MockShard;
    use crate::split::{BackfillState, BackfillStatus, Phase, TailState, TailStatus};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn plan_with_watermark(last_event_id: Option<u64>) -> SplitPlan {
        SplitPlan {
            split_id: "s1".to_string(),
            source_shard: "shard_0".to_string(),
            target_shard: "shard_3".to_string(),
            tenant_ids: vec!["t1".to_string()],
            phase: Phase::Tailing,
            routing_version_at_start: 1,
            routing_version_cutover: None,
            dual_write_started_at_ms: None,
            backfill: BackfillState { status: BackfillStatus::Completed, started_at_ms: None, completed_at_ms: None, error: None, per_table_cursor: HashMap::new(), rows_copied: 0 },
            tail: TailState { status: TailStatus::Pending, last_event_id, last_event_ts_ms: None, error: None, caught_up: false },
            error_message: None,
        }
    }

    fn coordinator_with(source: Arc<MockShard>, target: Arc<MockShard>) -> ShardCoordinator {
        let c = ShardCoordinator::new(5, 30_000);
        c.register_shard("shard_0", source as Arc<dyn crate::shard::AdminProtocol>);
        c.register_shard("shard_3", target as Arc<dyn crate::shard::AdminProtocol>);
        c
    }

    #[tokio::test]
    async fn replays_mutation_events_to_target() {
        let source = Arc::new(MockShard::new());
        let target = Arc::new(MockShard::new());
        source.mutation("t1", &Query { sql: "INSERT INTO users VALUES (1)".to_string(), params: vec![], hints: None }, None).await.unwrap();

        let coordinator = coordinator_with(source, target.clone());
        let progress = replay(&coordinator, &plan_with_watermark(None), 200, 0).await.unwrap();

        assert_eq!(progress.last_event_id, Some(1));
        assert!(progress.caught_up);
        assert_eq!(target.row_count("t1", "users"), 1);
    }

    #[tokio::test]
    async fn skips_select_events() {
        let source = Arc::new(MockShard::new());
        let target = Arc::new(MockShard::new());
        // Seed an event log entry that is a SELECT by going through mutation
        // classification directly isn't possible via MockShard (it only logs
        // mutations/ddl); this test documents intent via an empty source log.
        let coordinator = coordinator_with(source, target.clone());
        let progress = replay(&coordinator, &plan_with_watermark(None), 200, 0).await.unwrap();
        assert!(progress.caught_up);
        assert_eq!(target.row_count("t1", "users"), 0);
    }

    #[tokio::test]
    async fn watermark_advances_and_skips_already_seen_events() {
        let source = Arc::new(MockShard::new());
        let target = Arc::new(MockShard::new());
        source.mutation("t1", &Query { sql: "INSERT INTO users VALUES (1)".to_string(), params: vec![], hints: None }, None).await.unwrap();
        source.mutation("t1", &Query { sql: "INSERT INTO users VALUES (2)".to_string(), params: vec![], hints: None }, None).await.unwrap();

        let coordinator = coordinator_with(source, target.clone());
        let progress = replay(&coordinator, &plan_with_watermark(Some(1)), 200, 0).await.unwrap();

        assert_eq!(progress.last_event_id, Some(2));
        assert_eq!(target.row_count("t1", "users"), 1);
    }

    #[tokio::test]
    async fn batch_smaller_than_limit_marks_caught_up() {
        let source = Arc::new(MockShard::new());
        let target = Arc::new(MockShard::new());
        source.mutation("t1", &Query { sql: "INSERT INTO users VALUES (1)".to_string(), params: vec![], hints: None }, None).await.unwrap();
        let coordinator = coordinator_with(source, target);
        let progress = replay(&coordinator, &plan_with_watermark(None), 5, 0).await.unwrap();
        assert!(progress.caught_up);
    }
}
