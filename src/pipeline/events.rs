//! Invalidation events emitted after a successful write (§4.F point 3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub shard_id: String,
    pub version: u64,
    pub timestamp: u64,
    pub keys: Vec<String>,
}

impl InvalidationEvent {
    pub fn new(shard_id: impl Into<String>, version: u64, timestamp: u64, tenant: &str, table: &str) -> Self {
        Self {
            event_type: "invalidate",
            shard_id: shard_id.into(),
            version,
            timestamp,
            keys: vec![format!("{}:{}", tenant, table)],
        }
    }
}
