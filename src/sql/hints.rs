//! Consistency hint extraction — `/*+ strong */`, `/*+ bounded[=N] */`,
//! `/*+ weak */` (case-insensitive). Multiple hints: last wins. Hint
//! comments are stripped from the SQL before classification/transpilation.

use serde::{Deserialize, Serialize};

use super::scanner::{scan, Segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consistency {
    Strong,
    Bounded,
    /// "Cached" in the spec's vocabulary — stale-while-revalidate.
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hint {
    pub consistency: Consistency,
    pub bounded_ms: Option<u64>,
}

fn parse_hint_comment(inner: &str) -> Option<Hint> {
    // `inner` is the comment's content stripped of the leading `/*+` and
    // trailing `*/`, e.g. " strong ", " bounded=500 ", " weak ".
    let trimmed = inner.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower == "strong" {
        Some(Hint { consistency: Consistency::Strong, bounded_ms: None })
    } else if lower == "weak" {
        Some(Hint { consistency: Consistency::Weak, bounded_ms: None })
    } else if lower == "bounded" {
        Some(Hint { consistency: Consistency::Bounded, bounded_ms: None })
    } else if let Some(rest) = lower.strip_prefix("bounded=") {
        rest.trim().parse::<u64>().ok().map(|ms| Hint {
            consistency: Consistency::Bounded,
            bounded_ms: Some(ms),
        })
    } else {
        None
    }
}

/// Strips every `/*+ ... */` hint comment from `sql`, returning the
/// stripped SQL and the last hint found (if any).
pub fn strip_hints(sql: &str) -> (String, Option<Hint>) {
    let segments = scan(sql);
    let mut last_hint = None;
    let mut out = String::new();

    for seg in &segments {
        match seg {
            Segment::Comment(text) if text.starts_with("/*+") => {
                let inner = text
                    .strip_prefix("/*+")
                    .and_then(|s| s.strip_suffix("*/"))
                    .unwrap_or("");
                if let Some(hint) = parse_hint_comment(inner) {
                    last_hint = Some(hint);
                }
                // Hint comments are removed entirely (not even replaced
                // with whitespace) to match "removed from SQL".
            }
            Segment::Code(s) => out.push_str(s),
            Segment::StringLiteral(s) | Segment::BacktickIdent(s) | Segment::Comment(s) => {
                out.push_str(s)
            }
        }
    }

    (out, last_hint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_hint() {
        let (sql, hint) = strip_hints("SELECT /*+ strong */ * FROM users");
        assert_eq!(sql, "SELECT  * FROM users");
        assert_eq!(hint.unwrap().consistency, Consistency::Strong);
    }

    #[test]
    fn bounded_with_ms_value() {
        let (_, hint) = strip_hints("SELECT /*+ bounded=500 */ * FROM t");
        let hint = hint.unwrap();
        assert_eq!(hint.consistency, Consistency::Bounded);
        assert_eq!(hint.bounded_ms, Some(500));
    }

    #[test]
    fn case_insensitive() {
        let (_, hint) = strip_hints("SELECT /*+ STRONG */ 1");
        assert_eq!(hint.unwrap().consistency, Consistency::Strong);
    }

    #[test]
    fn multiple_hints_last_wins() {
        let (_, hint) = strip_hints("SELECT /*+ strong */ 1 /*+ weak */");
        assert_eq!(hint.unwrap().consistency, Consistency::Weak);
    }

    #[test]
    fn no_hint_present() {
        let (sql, hint) = strip_hints("SELECT 1");
        assert_eq!(sql, "SELECT 1");
        assert!(hint.is_none());
    }

    #[test]
    fn ordinary_comment_is_preserved_not_treated_as_hint() {
        let (sql, hint) = strip_hints("SELECT 1 /* just a comment */");
        assert!(hint.is_none());
        assert!(sql.contains("/* just a comment */"));
    }
}
