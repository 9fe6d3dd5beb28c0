//! In-memory `PolicyStore`.
//!
//! Current-version pointer is an atomic-swap-style update under a single
//! `RwLock`, matching the "global mutable state... single typed container"
//! guidance. History is retained indefinitely (§3: "retained for rollback").

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{validate_propose, Policy, PolicyStore};
use crate::error::{Result, WorkerSqlError};

struct Inner {
    current_version: u64,
    history: HashMap<u64, Policy>,
}

pub struct MemoryPolicyStore {
    inner: RwLock<Inner>,
}

impl MemoryPolicyStore {
    /// Seeds the store with an initial policy at version 1. The caller
    /// supplies a fully-formed `Policy` (typically built via `Policy::new`
    /// with `version: 1`).
    pub fn new(initial: Policy) -> Self {
        let mut history = HashMap::new();
        let version = initial.version;
        history.insert(version, initial);
        Self {
            inner: RwLock::new(Inner {
                current_version: version,
                history,
            }),
        }
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn current(&self) -> Policy {
        let inner = self.inner.read().unwrap();
        inner
            .history
            .get(&inner.current_version)
            .cloned()
            .expect("current version always present in history")
    }

    async fn at_version(&self, version: u64) -> Option<Policy> {
        self.inner.read().unwrap().history.get(&version).cloned()
    }

    async fn propose(&self, next: Policy) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let current = inner
            .history
            .get(&inner.current_version)
            .cloned()
            .expect("current version always present in history");
        validate_propose(&current, &next)?;
        let version = next.version;
        inner.history.insert(version, next);
        inner.current_version = version;
        Ok(())
    }

    async fn rollback_to(&self, v: u64) -> Result<Policy> {
        let mut inner = self.inner.write().unwrap();
        let target = inner
            .history
            .get(&v)
            .cloned()
            .ok_or_else(|| WorkerSqlError::NotFound(format!("no policy at version {}", v)))?;
        let current = inner
            .history
            .get(&inner.current_version)
            .cloned()
            .expect("current version always present in history");
        let new_version = current.version + 1;
        let rolled_back = Policy::new(new_version, target.timestamp, target.tenants, target.ranges);
        inner.history.insert(new_version, rolled_back.clone());
        inner.current_version = new_version;
        Ok(rolled_back)
    }
}
