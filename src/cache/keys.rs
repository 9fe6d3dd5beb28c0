//! Cache key scheme (§6) — exact formats observed by tests.

use crate::hash::query_digest;

/// `<tenant>:q:<table>:<hex-digest>`
pub fn query_key(tenant: &str, table: &str, sql_normalized: &str, params: &[String]) -> String {
    let digest = query_digest(sql_normalized, params);
    format!("{}:q:{}:{}", tenant, table, digest)
}

/// `t:<table>:id:<pk>`
pub fn entity_key(table: &str, pk: &str) -> String {
    format!("t:{}:id:{}", table, pk)
}

/// `idx:<table>:<column>:<value>`
pub fn index_key(table: &str, column: &str, value: &str) -> String {
    format!("idx:{}:{}:{}", table, column, value)
}

/// `<tenant>:q:<table>:*` — invalidation pattern after a mutation.
pub fn invalidation_pattern_mutation(tenant: &str, table: &str) -> String {
    format!("{}:q:{}:*", tenant, table)
}

/// `<tenant>:q:*` — invalidation pattern after DDL (all tenant queries).
pub fn invalidation_pattern_ddl(tenant: &str) -> String {
    format!("{}:q:*", tenant)
}

/// `idemp:batch:<tenant>:<key>`
pub fn idempotency_key(tenant: &str, key: &str) -> String {
    format!("idemp:batch:{}:{}", tenant, key)
}
