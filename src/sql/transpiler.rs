//! MySQL -> SQLite dialect rewrites (§4.C).
//!
//! Transpilation is total: it never errors on well-formed input (invalid
//! SQL isn't this layer's job — the shard rejects it). Rewrites only ever
//! touch `Code` segments from the scanner, so they never reach inside
//! string literals, backtick identifiers, or comments. `CONCAT(...)` and
//! the date-part functions need balanced-paren argument extraction rather
//! than a single regex, since their arguments may themselves contain
//! commas and nested calls.

use once_cell::sync::Lazy;
use regex::Regex;

use super::hints::{strip_hints, Hint};
use super::scanner::{map_code, scan};

pub struct Transpiled {
    pub sql: String,
    pub hint: Option<Hint>,
}

/// Performs every MySQL -> SQLite rewrite and extracts the consistency hint.
pub fn transpile(sql: &str) -> Transpiled {
    let (stripped, hint) = strip_hints(sql);
    let segments = scan(&stripped);
    let rewritten = map_code(&segments, |code| rewrite_code(code));
    Transpiled { sql: rewritten, hint }
}

fn rewrite_code(code: &str) -> String {
    let mut s = code.to_string();
    s = rewrite_types(&s);
    s = rewrite_function_calls(&s);
    s = rewrite_simple_patterns(&s);
    s
}

static INT_TYPES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(BIGINT|TINYINT|INT)\b").unwrap());
static VARCHAR_N: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bVARCHAR\s*\(\s*\d+\s*\)").unwrap());
static TEXTLIKE_TYPES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(DATETIME|TIMESTAMP|VARCHAR)\b").unwrap());
static REAL_TYPES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(FLOAT|DOUBLE|DECIMAL)\b").unwrap());
static BOOLEAN_TYPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bBOOLEAN\b").unwrap());

fn rewrite_types(s: &str) -> String {
    let s = VARCHAR_N.replace_all(s, "TEXT").into_owned();
    let s = TEXTLIKE_TYPES.replace_all(&s, "TEXT").into_owned();
    let s = INT_TYPES.replace_all(&s, "INTEGER").into_owned();
    let s = REAL_TYPES.replace_all(&s, "REAL").into_owned();
    BOOLEAN_TYPE.replace_all(&s, "INTEGER").into_owned()
}

static CEIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCEIL\b").unwrap());
static AUTO_INCREMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAUTO_INCREMENT\b").unwrap());
static LIMIT_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bLIMIT\s+(\d+)\s*,\s*(\d+)\b").unwrap());
static BEGIN_TXN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(START\s+TRANSACTION|BEGIN)\s*;?\s*$").unwrap());
static ENGINE_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bENGINE\s*=\s*\w+").unwrap());
static CHARSET_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDEFAULT\s+CHARSET\s*=\s*\w+").unwrap());

fn rewrite_simple_patterns(s: &str) -> String {
    let s = CEIL.replace_all(s, "CEILING").into_owned();
    let s = AUTO_INCREMENT.replace_all(&s, "AUTOINCREMENT").into_owned();
    let s = LIMIT_OFFSET.replace_all(&s, "LIMIT $2 OFFSET $1").into_owned();
    let s = BEGIN_TXN.replace(&s, "BEGIN TRANSACTION").into_owned();
    let s = ENGINE_CLAUSE.replace_all(&s, "").into_owned();
    CHARSET_CLAUSE.replace_all(&s, "").into_owned()
}

static NOW_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bNOW\s*\(\s*\)").unwrap());
static CURDATE_CALL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bCURDATE\s*\(\s*\)").unwrap());

fn rewrite_function_calls(s: &str) -> String {
    let s = NOW_CALL.replace_all(s, "DATETIME('now')").into_owned();
    let s = CURDATE_CALL.replace_all(&s, "DATE('now')").into_owned();
    let s = rewrite_date_part_calls(&s);
    rewrite_concat_calls(&s)
}

/// `YEAR(x)` / `MONTH(x)` / `DAY(x)` -> `STRFTIME('%Y'/'%m'/'%d', x)`.
/// Arguments are extracted via balanced-paren scanning so nested calls
/// (`YEAR(COALESCE(a, b))`) survive intact.
fn rewrite_date_part_calls(s: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if let Some((fmt, consumed)) = match_date_part_head(&chars, i) {
            if let Some((arg, end)) = read_balanced_call_args(&chars, i + consumed) {
                out.push_str(&format!("STRFTIME('{}', {})", fmt, arg));
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

fn match_date_part_head(chars: &[char], pos: usize) -> Option<(&'static str, usize)> {
    const NAMES: &[(&str, &str)] = &[("YEAR", "%Y"), ("MONTH", "%m"), ("DAY", "%d")];
    for (name, fmt) in NAMES {
        let n = name.len();
        if pos + n <= chars.len() {
            let candidate: String = chars[pos..pos + n].iter().collect();
            if candidate.eq_ignore_ascii_case(name) && is_word_boundary(chars, pos, pos + n) {
                // must be followed (skipping whitespace) by '('
                let mut j = pos + n;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '(' {
                    return Some((fmt, n));
                }
            }
        }
    }
    None
}

fn is_word_boundary(chars: &[char], start: usize, end: usize) -> bool {
    let before_ok = start == 0 || !is_word_char(chars[start - 1]);
    let after_ok = end >= chars.len() || !is_word_char(chars[end]);
    before_ok && after_ok
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Finds `CONCAT(...)` calls and rewrites them to a chained `||`
/// expression, splitting top-level (depth-0) commas.
fn rewrite_concat_calls(s: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        const NAME: &str = "CONCAT";
        let n = NAME.len();
        if i + n <= chars.len() {
            let candidate: String = chars[i..i + n].iter().collect();
            if candidate.eq_ignore_ascii_case(NAME) && is_word_boundary(chars.as_slice(), i, i + n)
            {
                let mut j = i + n;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                if j < chars.len() && chars[j] == '(' {
                    if let Some((args, end)) = read_balanced_call_args(&chars, i + n) {
                        let parts = split_top_level_commas(&args);
                        out.push_str(&parts.join(" || "));
                        i = end;
                        continue;
                    }
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Given `chars` and a position at (or before, skipping whitespace) an
/// opening paren, returns the text between the matching parens and the
/// index just past the closing paren.
fn read_balanced_call_args(chars: &[char], mut pos: usize) -> Option<(String, usize)> {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    if pos >= chars.len() || chars[pos] != '(' {
        return None;
    }
    let start = pos + 1;
    let mut depth = 1;
    let mut i = start;
    while i < chars.len() {
        match chars[i] {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((chars[start..i].iter().collect(), i + 1));
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level_commas(args: &str) -> Vec<String> {
    let chars: Vec<char> = args.chars().collect();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
        } else if c == '\'' || c == '"' {
            quote = Some(c);
            current.push(c);
        } else if c == '(' {
            depth += 1;
            current.push(c);
        } else if c == ')' {
            depth -= 1;
            current.push(c);
        } else if c == ',' && depth == 0 {
            parts.push(current.trim().to_string());
            current = String::new();
        } else {
            current.push(c);
        }
        i += 1;
    }
    if !current.trim().is_empty() || !parts.is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}
