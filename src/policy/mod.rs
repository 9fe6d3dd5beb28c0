//! Policy Store (Component B)
//!
//! Versioned routing policies: `(tenant, table) -> shard`. Policies are
//! immutable once published; `propose` installs a new version atomically
//! iff it is the direct successor of the current version and its checksum
//! matches its content. `rollback_to` republishes an old version's content
//! as a new version, preserving monotonicity (§4.B).

mod store;

pub use store::MemoryPolicyStore;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerSqlError};
use crate::hash::sha256_hex;

/// An ordered `{ prefix, shard_id }` fallback rule. The first rule whose
/// `prefix` is a prefix of the table name wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRule {
    pub prefix: String,
    pub shard_id: String,
}

/// An immutable, versioned routing policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub version: u64,
    pub timestamp: u64,
    pub checksum: String,
    /// Exact `tenant -> shard` mappings; BTreeMap to make canonical
    /// serialization (and thus the checksum) order-independent of insertion.
    pub tenants: std::collections::BTreeMap<String, String>,
    pub ranges: Vec<RangeRule>,
}

impl Policy {
    /// Computes the checksum over the canonical serialization of
    /// `(version, tenants, ranges)` — `tenants` is already sorted by key
    /// since it's a `BTreeMap`; canonical JSON gives sorted object keys.
    pub fn compute_checksum(version: u64, tenants: &std::collections::BTreeMap<String, String>, ranges: &[RangeRule]) -> String {
        #[derive(Serialize)]
        struct Canonical<'a> {
            version: u64,
            tenants: &'a std::collections::BTreeMap<String, String>,
            ranges: &'a [RangeRule],
        }
        let canonical = Canonical {
            version,
            tenants,
            ranges,
        };
        let bytes = serde_json::to_vec(&canonical).expect("canonical policy serialization cannot fail");
        sha256_hex(&bytes)
    }

    /// Builds a policy with a freshly computed checksum — the constructor
    /// a caller should use instead of hand-assembling a `Policy` (which
    /// would make it easy to forget to recompute the checksum).
    pub fn new(
        version: u64,
        timestamp: u64,
        tenants: std::collections::BTreeMap<String, String>,
        ranges: Vec<RangeRule>,
    ) -> Self {
        let checksum = Self::compute_checksum(version, &tenants, &ranges);
        Self {
            version,
            timestamp,
            checksum,
            tenants,
            ranges,
        }
    }

    /// Invariant 1: serialize+hash(p) == p.checksum.
    pub fn verify_checksum(&self) -> bool {
        Self::compute_checksum(self.version, &self.tenants, &self.ranges) == self.checksum
    }

    /// Resolves `table` against `ranges` in order; first prefix match wins.
    pub fn resolve_range(&self, table: &str) -> Option<&str> {
        self.ranges
            .iter()
            .find(|r| table.starts_with(r.prefix.as_str()))
            .map(|r| r.shard_id.as_str())
    }
}

/// Policy Store contract (§4.B).
#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Fast path: current policy, served from an in-memory copy.
    async fn current(&self) -> Policy;

    /// Historical lookup by version.
    async fn at_version(&self, version: u64) -> Option<Policy>;

    /// Atomically installs `next` iff it is the direct successor of the
    /// current version and its checksum matches its own content.
    async fn propose(&self, next: Policy) -> Result<()>;

    /// Republishes the content of version `v` as a new version equal to
    /// `current + 1`.
    async fn rollback_to(&self, v: u64) -> Result<Policy>;
}

pub(crate) fn validate_propose(current: &Policy, next: &Policy) -> Result<()> {
    if next.version != current.version + 1 {
        return Err(WorkerSqlError::VersionConflict {
            expected: current.version + 1,
            got: next.version,
        });
    }
    if !next.verify_checksum() {
        // Checksum mismatch is fatal for this update attempt (§7) — it is
        // reported as the same VersionConflict kind as a raced version
        // bump, since §4.B specifies no separate error kind for it.
        return Err(WorkerSqlError::VersionConflict {
            expected: current.version + 1,
            got: next.version,
        });
    }
    Ok(())
}
