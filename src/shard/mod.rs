//! Shard Coordinator (Component E) — wire-level shard contract, circuit
//! breaker, stub cache, dual-write fanout, and batch grouping.

mod breaker;
pub mod mock;
mod coordinator;

pub use breaker::{Breaker, BreakerState};
pub use coordinator::ShardCoordinator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stable string identifier for a shard, addressable via the admin protocol.
pub type ShardId = String;

/// A single SQL operation with positional parameters, serialized as JSON
/// values so the shard boundary doesn't need to know our internal `Value`
/// representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub sql: String,
    pub params: Vec<serde_json::Value>,
    pub hints: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdlResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOp {
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPage {
    pub rows: Vec<serde_json::Value>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Query,
    Ddl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardEvent {
    pub id: u64,
    pub ts_ms: u64,
    pub tenant_id: String,
    pub event_type: EventType,
    pub sql: String,
    pub params: Vec<serde_json::Value>,
}

/// The admin protocol a shard exposes (§6). Transport-agnostic: an
/// implementation might speak HTTP, an RPC framework, or (in tests and the
/// demo binary) nothing at all — just an in-memory map.
#[async_trait]
pub trait AdminProtocol: Send + Sync {
    async fn query(&self, tenant_id: &str, query: &Query) -> Result<QueryResponse>;

    async fn mutation(
        &self,
        tenant_id: &str,
        query: &Query,
        transaction_id: Option<&str>,
    ) -> Result<MutationResponse>;

    async fn ddl(&self, tenant_id: &str, query: &Query) -> Result<DdlResponse>;

    async fn mutation_batch(&self, tenant_id: &str, ops: &[BatchOp]) -> Result<BatchResponse>;

    async fn export(
        &self,
        tenant_id: &str,
        table: &str,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<ExportPage>;

    async fn import(&self, tenant_id: &str, table: &str, rows: Vec<serde_json::Value>) -> Result<()>;

    async fn events(
        &self,
        after: u64,
        limit: u32,
        tenant_ids: &[String],
    ) -> Result<Vec<ShardEvent>>;
}
