//! Backfill: bulk-copies existing rows for every `(tenant, table)` pair a
//! split covers from source to target, via paginated `export`/`import`
//! (§4.G Backfill row).

use std::collections::HashMap;

use crate::error::Result;
use crate::shard::ShardCoordinator;

use super::SplitPlan;

pub struct BackfillProgress {
    pub per_table_cursor: HashMap<String, String>,
    pub rows_copied: u64,
}

fn cursor_key(tenant: &str, table: &str) -> String {
    format!("{}::{}", tenant, table)
}

/// Streams every page of every `(tenant, table)` pair to completion.
/// Persists the cursor after each page succeeds on both source and target,
/// so a resumed run (via `per_table_cursor` already on the plan) picks up
/// where it left off rather than re-copying from the start.
pub async fn run(
    coordinator: &ShardCoordinator,
    plan: &SplitPlan,
    tables: &[String],
    page_size: u32,
) -> Result<BackfillProgress> {
    let mut per_table_cursor = plan.backfill.per_table_cursor.clone();
    let mut rows_copied = 0u64;

    for tenant in &plan.tenant_ids {
        for table in tables {
            let key = cursor_key(tenant, table);
            let mut cursor = per_table_cursor.get(&key).cloned();

            loop {
                let page = coordinator
                    .export(&plan.source_shard, tenant, table, cursor.as_deref(), page_size)
                    .await?;

                if !page.rows.is_empty() {
                    coordinator.import(&plan.target_shard, tenant, table, page.rows.clone()).await?;
                    rows_copied += page.rows.len() as u64;
                }

                match page.next_cursor {
                    Some(next) => {
                        cursor = Some(next.clone());
                        per_table_cursor.insert(key.clone(), next);
                        tokio::task::yield_now().await;
                    }
                    None => {
                        per_table_cursor.remove(&key);
                        break;
                    }
                }
            }
        }
    }

    Ok(BackfillProgress { per_table_cursor, rows_copied })
}
