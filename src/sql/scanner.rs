//! Minimal SQL surface scanner.
//!
//! Splits a SQL string into segments so the classifier, hint extractor, and
//! transpiler can each ignore string literals, backtick identifiers, and
//! comments when they need to — rewrites and keyword scanning "MUST NOT
//! apply inside string literals or comments" per the transpiler contract.
//!
//! Grounded on the teacher's `Lexer` (`lexer.rs`): a `Vec<char>` cursor with
//! `peek`/`peek_ahead`/`advance`, the same comment-skipping rules (`--` line
//! comments, `/* */` block comments), the same string-escape handling
//! (backslash escape and doubled-quote escape). Unlike the teacher's lexer
//! this one does not tokenize keywords — it only needs to know "is this
//! position inside a literal/comment or not".

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Ordinary SQL text: keywords, identifiers, punctuation, placeholders.
    Code(String),
    /// A single- or double-quoted string literal, including its quotes.
    StringLiteral(String),
    /// A backtick-quoted identifier, including the backticks.
    BacktickIdent(String),
    /// A `-- ...` line comment or `/* ... */` block comment, including delimiters.
    Comment(String),
}

struct Scanner {
    input: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }
}

/// Splits `sql` into an ordered sequence of segments covering the whole
/// input. Concatenating every segment's raw text reproduces `sql` exactly.
pub fn scan(sql: &str) -> Vec<Segment> {
    let mut scanner = Scanner::new(sql);
    let mut segments = Vec::new();
    let mut code_buf = String::new();

    macro_rules! flush_code {
        () => {
            if !code_buf.is_empty() {
                segments.push(Segment::Code(std::mem::take(&mut code_buf)));
            }
        };
    }

    while let Some(c) = scanner.peek() {
        if c == '\'' || c == '"' {
            flush_code!();
            segments.push(Segment::StringLiteral(read_string_literal(&mut scanner, c)));
        } else if c == '`' {
            flush_code!();
            segments.push(Segment::BacktickIdent(read_backtick(&mut scanner)));
        } else if c == '-' && scanner.peek_ahead(1) == Some('-') {
            flush_code!();
            segments.push(Segment::Comment(read_line_comment(&mut scanner)));
        } else if c == '/' && scanner.peek_ahead(1) == Some('*') {
            flush_code!();
            segments.push(Segment::Comment(read_block_comment(&mut scanner)));
        } else {
            code_buf.push(c);
            scanner.advance();
        }
    }
    flush_code!();
    segments
}

fn read_string_literal(scanner: &mut Scanner, quote: char) -> String {
    let mut out = String::new();
    out.push(quote);
    scanner.advance();
    while let Some(c) = scanner.peek() {
        if c == '\\' {
            out.push(c);
            scanner.advance();
            if let Some(escaped) = scanner.advance() {
                out.push(escaped);
            }
        } else if c == quote {
            if scanner.peek_ahead(1) == Some(quote) {
                out.push(quote);
                out.push(quote);
                scanner.advance();
                scanner.advance();
            } else {
                out.push(quote);
                scanner.advance();
                break;
            }
        } else {
            out.push(c);
            scanner.advance();
        }
    }
    out
}

fn read_backtick(scanner: &mut Scanner) -> String {
    let mut out = String::new();
    out.push('`');
    scanner.advance();
    while let Some(c) = scanner.advance() {
        out.push(c);
        if c == '`' {
            break;
        }
    }
    out
}

fn read_line_comment(scanner: &mut Scanner) -> String {
    let mut out = String::new();
    while let Some(c) = scanner.peek() {
        out.push(c);
        scanner.advance();
        if c == '\n' {
            break;
        }
    }
    out
}

fn read_block_comment(scanner: &mut Scanner) -> String {
    let mut out = String::new();
    out.push_str("/*");
    scanner.advance();
    scanner.advance();
    while let Some(c) = scanner.advance() {
        out.push(c);
        if c == '*' && scanner.peek() == Some('/') {
            out.push('/');
            scanner.advance();
            break;
        }
    }
    out
}

/// Rejoins segments back into a single string, applying `f` to the text of
/// `Code` segments only.
pub fn map_code(segments: &[Segment], mut f: impl FnMut(&str) -> String) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            Segment::Code(s) => out.push_str(&f(s)),
            Segment::StringLiteral(s) | Segment::BacktickIdent(s) | Segment::Comment(s) => {
                out.push_str(s)
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|s| match s {
                Segment::Code(s) => s.clone(),
                Segment::StringLiteral(s) => s.clone(),
                Segment::BacktickIdent(s) => s.clone(),
                Segment::Comment(s) => s.clone(),
            })
            .collect()
    }

    #[test]
    fn scan_reproduces_input_exactly() {
        let sql = "SELECT * FROM `users` WHERE name = 'O''Brien' -- trailing\n AND x = ?";
        assert_eq!(reassemble(&scan(sql)), sql);
    }

    #[test]
    fn string_literal_with_doubled_quote_is_one_segment() {
        let segs = scan("'a''b'");
        assert_eq!(segs, vec![Segment::StringLiteral("'a''b'".to_string())]);
    }

    #[test]
    fn block_comment_is_isolated() {
        let segs = scan("SELECT /*+ strong */ 1");
        assert!(segs.iter().any(|s| matches!(s, Segment::Comment(c) if c == "/*+ strong */")));
    }

    #[test]
    fn backtick_identifier_is_isolated() {
        let segs = scan("SELECT * FROM `my table`");
        assert!(segs
            .iter()
            .any(|s| matches!(s, Segment::BacktickIdent(c) if c == "`my table`")));
    }

    #[test]
    fn map_code_only_rewrites_code_segments() {
        let segs = scan("SELECT 'FROM' FROM t");
        let out = map_code(&segs, |s| s.replace("FROM", "XXXX"));
        assert_eq!(out, "SELECT 'FROM' XXXX t");
    }
}
