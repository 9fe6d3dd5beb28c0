//! Statement classification and best-effort table extraction.

use super::scanner::{scan, Segment};
use crate::error::{Result, WorkerSqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
}

/// Classifies `sql` by its leading keyword after whitespace/comment/hint
/// stripping. Unknown leading keywords (including transaction control
/// statements, which this pipeline does not route) are rejected.
pub fn classify(sql: &str) -> Result<Kind> {
    let leading = leading_keyword(sql).ok_or_else(|| {
        WorkerSqlError::InvalidSql("empty or unparseable statement".to_string())
    })?;

    match leading.as_str() {
        "SELECT" => Ok(Kind::Select),
        "INSERT" => Ok(Kind::Insert),
        "UPDATE" => Ok(Kind::Update),
        "DELETE" => Ok(Kind::Delete),
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => Ok(Kind::Ddl),
        other => Err(WorkerSqlError::InvalidSql(format!(
            "unknown leading keyword '{}'",
            other
        ))),
    }
}

fn leading_keyword(sql: &str) -> Option<String> {
    for seg in scan(sql) {
        if let Segment::Code(text) = seg {
            if let Some(word) = text.split_whitespace().next() {
                return Some(word.to_ascii_uppercase());
            }
        }
    }
    None
}

enum Tok {
    Keyword(String),
    Ident(String),
}

fn tokenize_code(sql: &str) -> Vec<Tok> {
    let mut tokens = Vec::new();
    for seg in scan(sql) {
        match seg {
            Segment::Code(text) => {
                for word in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
                    if word.is_empty() {
                        continue;
                    }
                    let upper = word.to_ascii_uppercase();
                    if KEYWORDS.contains(&upper.as_str()) {
                        tokens.push(Tok::Keyword(upper));
                    } else {
                        tokens.push(Tok::Ident(word.to_string()));
                    }
                }
            }
            Segment::BacktickIdent(text) => {
                let stripped = text.trim_matches('`');
                tokens.push(Tok::Ident(stripped.to_string()));
            }
            Segment::StringLiteral(_) | Segment::Comment(_) => {}
        }
    }
    tokens
}

const KEYWORDS: &[&str] = &["FROM", "INTO", "UPDATE", "JOIN", "TABLE", "INDEX", "ON"];

/// Best-effort first-table extraction. Recognizes `FROM`, `INTO`, `UPDATE`,
/// `JOIN`, `TABLE` as directly preceding the table identifier; `INDEX`
/// delegates to the `ON <table>` clause when present (covers
/// `CREATE INDEX ... ON table(...)`), falling back to the identifier
/// immediately following `INDEX` otherwise. Returns a lowercased name, or
/// `"unknown"` if nothing matched.
pub fn extract_table(sql: &str) -> String {
    let tokens = tokenize_code(sql);

    for (i, tok) in tokens.iter().enumerate() {
        let Tok::Keyword(kw) = tok else { continue };
        match kw.as_str() {
            "INDEX" => {
                if let Some(on_pos) = tokens[i + 1..]
                    .iter()
                    .position(|t| matches!(t, Tok::Keyword(k) if k == "ON"))
                {
                    let idx = i + 1 + on_pos + 1;
                    if let Some(Tok::Ident(name)) = tokens.get(idx) {
                        return name.to_lowercase();
                    }
                }
                if let Some(Tok::Ident(name)) = tokens.get(i + 1) {
                    return name.to_lowercase();
                }
            }
            "FROM" | "INTO" | "UPDATE" | "JOIN" | "TABLE" => {
                if let Some(Tok::Ident(name)) = tokens.get(i + 1) {
                    return name.to_lowercase();
                }
            }
            _ => {}
        }
    }

    "unknown".to_string()
}
