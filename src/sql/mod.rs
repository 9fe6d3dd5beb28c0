//! SQL Classifier & Transpiler (Component C)
//!
//! Classifies statements, rewrites MySQL-isms to their SQLite equivalents,
//! and extracts caller-supplied consistency hints — all without a full SQL
//! parser, since the shard (out of scope here) is the thing that actually
//! validates and executes the statement.

mod classifier;
mod hints;
mod scanner;
mod transpiler;

pub use classifier::{classify, extract_table, Kind};
pub use hints::{Consistency, Hint};
pub use transpiler::{transpile, Transpiled};

/// Normalizes SQL for cache-key digesting: collapses whitespace runs and
/// lowercases, so `SELECT  *  FROM t` and `select * from t` share a key.
/// Only used as a cache-key input, never as the SQL actually sent to a shard.
pub fn normalize_for_digest(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(
            normalize_for_digest("SELECT   *\nFROM  t"),
            normalize_for_digest("select * from t")
        );
    }
}
