//! Test-only in-memory shard: implements [`AdminProtocol`] over a plain
//! `HashMap` of rows plus an append-only event log, so the rest of the crate
//! (and its tests) can exercise routing/pipeline/split logic without a real
//! shard transport. Grounded on the teacher's `SandstoneSharedState` pattern
//! of a single struct owning a handful of independently-locked maps.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, WorkerSqlError};

use super::{
    AdminProtocol, BatchOp, BatchResponse, DdlResponse, EventType, ExportPage, MutationResponse,
    Query, QueryResponse, ShardEvent,
};

type RowKey = (String, String);

/// An in-memory shard. Rows are opaque JSON objects; `sql`/`params` are not
/// interpreted beyond extracting a conventional `table` hint embedded by the
/// caller — this is a test double, not a query engine.
pub struct MockShard {
    rows: RwLock<HashMap<RowKey, Vec<Value>>>,
    events: RwLock<Vec<ShardEvent>>,
    next_event_id: AtomicU64,
    /// When set, every call fails with this error instead of touching state
    /// — used to simulate shard outages for circuit-breaker tests.
    fail_with: RwLock<Option<String>>,
}

impl MockShard {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            next_event_id: AtomicU64::new(1),
            fail_with: RwLock::new(None),
        }
    }

    pub fn set_failing(&self, message: Option<&str>) {
        *self.fail_with.write().expect("fail_with lock poisoned") = message.map(|m| m.to_string());
    }

    pub fn seed_rows(&self, tenant_id: &str, table: &str, rows: Vec<Value>) {
        self.rows
            .write()
            .expect("rows lock poisoned")
            .insert((tenant_id.to_string(), table.to_string()), rows);
    }

    pub fn row_count(&self, tenant_id: &str, table: &str) -> usize {
        self.rows
            .read()
            .expect("rows lock poisoned")
            .get(&(tenant_id.to_string(), table.to_string()))
            .map(|r| r.len())
            .unwrap_or(0)
    }

    fn check_failing(&self) -> Result<()> {
        if let Some(msg) = self.fail_with.read().expect("fail_with lock poisoned").clone() {
            return Err(WorkerSqlError::MutationFailed(msg));
        }
        Ok(())
    }

    fn append_event(&self, tenant_id: &str, event_type: EventType, sql: &str, params: &[Value]) {
        let id = self.next_event_id.fetch_add(1, Ordering::SeqCst);
        self.events.write().expect("events lock poisoned").push(ShardEvent {
            id,
            ts_ms: id,
            tenant_id: tenant_id.to_string(),
            event_type,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

impl Default for MockShard {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdminProtocol for MockShard {
    async fn query(&self, tenant_id: &str, query: &Query) -> Result<QueryResponse> {
        self.check_failing()?;
        let table = crate::sql::extract_table(&query.sql);
        let rows = self
            .rows
            .read()
            .expect("rows lock poisoned")
            .get(&(tenant_id.to_string(), table))
            .cloned()
            .unwrap_or_default();
        Ok(QueryResponse { success: true, data: Value::Array(rows) })
    }

    async fn mutation(
        &self,
        tenant_id: &str,
        query: &Query,
        _transaction_id: Option<&str>,
    ) -> Result<MutationResponse> {
        self.check_failing()?;
        let table = crate::sql::extract_table(&query.sql);
        let mut rows = self.rows.write().expect("rows lock poisoned");
        let entry = rows.entry((tenant_id.to_string(), table)).or_default();
        let kind = crate::sql::classify(&query.sql).unwrap_or(crate::sql::Kind::Update);
        let rows_affected = match kind {
            crate::sql::Kind::Insert => {
                entry.push(Value::Array(query.params.clone()));
                1
            }
            crate::sql::Kind::Delete => {
                let before = entry.len();
                entry.clear();
                before as u64
            }
            _ => entry.len() as u64,
        };
        drop(rows);
        self.append_event(tenant_id, EventType::Query, &query.sql, &query.params);
        Ok(MutationResponse { success: true, rows_affected, last_insert_id: Some(rows_affected) })
    }

    async fn ddl(&self, tenant_id: &str, query: &Query) -> Result<DdlResponse> {
        self.check_failing()?;
        let table = crate::sql::extract_table(&query.sql);
        self.rows
            .write()
            .expect("rows lock poisoned")
            .entry((tenant_id.to_string(), table))
            .or_default();
        self.append_event(tenant_id, EventType::Ddl, &query.sql, &query.params);
        Ok(DdlResponse { success: true })
    }

    async fn mutation_batch(&self, tenant_id: &str, ops: &[BatchOp]) -> Result<BatchResponse> {
        self.check_failing()?;
        let mut total = 0u64;
        for op in ops {
            let q = Query { sql: op.sql.clone(), params: op.params.clone(), hints: None };
            let resp = self.mutation(tenant_id, &q, None).await?;
            total += resp.rows_affected;
        }
        Ok(BatchResponse { success: true, rows_affected: total })
    }

    async fn export(
        &self,
        tenant_id: &str,
        table: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ExportPage> {
        self.check_failing()?;
        let rows = self.rows.read().expect("rows lock poisoned");
        let all = rows.get(&(tenant_id.to_string(), table.to_string())).cloned().unwrap_or_default();
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + limit as usize).min(all.len());
        let page = all.get(start..end).unwrap_or(&[]).to_vec();
        let next_cursor = if end < all.len() { Some(end.to_string()) } else { None };
        Ok(ExportPage { rows: page, next_cursor })
    }

    async fn import(&self, tenant_id: &str, table: &str, rows: Vec<Value>) -> Result<()> {
        self.check_failing()?;
        self.rows
            .write()
            .expect("rows lock poisoned")
            .entry((tenant_id.to_string(), table.to_string()))
            .or_default()
            .extend(rows);
        Ok(())
    }

    async fn events(&self, after: u64, limit: u32, tenant_ids: &[String]) -> Result<Vec<ShardEvent>> {
        self.check_failing()?;
        let events = self.events.read().expect("events lock poisoned");
        let filtered: Vec<ShardEvent> = events
            .iter()
            .filter(|e| e.id > after)
            .filter(|e| tenant_ids.is_empty() || tenant_ids.contains(&e.tenant_id))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::Query;

    fn q(sql: &str) -> Query {
        Query { sql: sql.to_string(), params: vec![], hints: None }
    }

    #[tokio::test]
    async fn mutation_insert_appends_row_and_event() {
        let shard = MockShard::new();
        let resp = shard.mutation("t1", &q("INSERT INTO users VALUES (1)"), None).await.unwrap();
        assert_eq!(resp.rows_affected, 1);
        assert_eq!(shard.row_count("t1", "users"), 1);
        let events = shard.events(0, 10, &[]).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn export_paginates_with_cursor() {
        let shard = MockShard::new();
        shard.seed_rows("t1", "users", vec![Value::from(1), Value::from(2), Value::from(3)]);
        let page1 = shard.export("t1", "users", None, 2).await.unwrap();
        assert_eq!(page1.rows.len(), 2);
        assert_eq!(page1.next_cursor.as_deref(), Some("2"));
        let page2 = shard.export("t1", "users", page1.next_cursor.as_deref(), 2).await.unwrap();
        assert_eq!(page2.rows.len(), 1);
        assert!(page2.next_cursor.is_none());
    }

    #[tokio::test]
    async fn import_upserts_rows() {
        let shard = MockShard::new();
        shard.import("t1", "users", vec![Value::from(1)]).await.unwrap();
        assert_eq!(shard.row_count("t1", "users"), 1);
    }

    #[tokio::test]
    async fn failing_shard_returns_error() {
        let shard = MockShard::new();
        shard.set_failing(Some("simulated outage"));
        let err = shard.mutation("t1", &q("INSERT INTO users VALUES (1)"), None).await.unwrap_err();
        assert_eq!(err.kind_tag(), "MutationFailed");
    }

    #[tokio::test]
    async fn events_filters_by_watermark_and_tenant() {
        let shard = MockShard::new();
        shard.mutation("t1", &q("INSERT INTO users VALUES (1)"), None).await.unwrap();
        shard.mutation("t2", &q("INSERT INTO users VALUES (2)"), None).await.unwrap();
        let events = shard.events(0, 10, &["t1".to_string()]).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].tenant_id, "t1");
    }
}
