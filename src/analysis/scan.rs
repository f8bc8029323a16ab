// src/analysis/scan.rs

//! Static identifier scanning over command source text.
//!
//! Nothing is executed. The scanner drops comments and single-quoted
//! literals (double-quoted text is kept, since `$name` expands there), then
//! collects identifier-shaped words that are not fragments of paths, file
//! names or flags (`data.csv`, `out/raw`, `--raw` do not yield `data`, `out`
//! or `raw`). Expansions always count: `$out/raw` yields `out`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"));

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("static regex"));

/// Whether `s` is a valid target / global name.
pub fn is_identifier(s: &str) -> bool {
    IDENT.is_match(s)
}

/// Identifiers referenced by `source`, deduplicated, in order of first
/// appearance.
pub fn identifiers(source: &str) -> Vec<String> {
    let code = strip_non_code(source);
    let bytes = code.as_bytes();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for m in WORD.find_iter(&code) {
        let before = m.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(m.end()).copied();

        if before.is_some_and(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'/' | b'-')) {
            continue;
        }
        // `$a.bak`, `$dir/x` and `${a-default}` reference `a` / `dir`; only
        // bare words get the path and flag filter.
        let path_like = after.is_some_and(|b| matches!(b, b'.' | b'/' | b'-'));
        if path_like && !is_expansion(bytes, m.start()) {
            continue;
        }

        let word = m.as_str();
        if seen.insert(word) {
            out.push(word.to_string());
        }
    }

    out
}

/// Whether the word starting at `start` follows `$`, `${` or `${#`.
fn is_expansion(bytes: &[u8], start: usize) -> bool {
    let prefix = &bytes[..start];
    prefix.ends_with(b"$") || prefix.ends_with(b"${") || prefix.ends_with(b"${#")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    Single,
    Double,
    Comment,
}

/// Blank out comments and single-quoted strings, keeping byte offsets
/// stable so neighbouring-character checks still see the real layout.
///
/// Double-quoted text is kept: `$var` expands there. Inside it `'` and `#`
/// are literal and a backslash escapes the next character.
fn strip_non_code(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut mode = Mode::Code;
    let mut escaped = false;
    let mut prev: Option<char> = None;

    for c in source.chars() {
        match mode {
            Mode::Comment => {
                if c == '\n' {
                    mode = Mode::Code;
                    out.push('\n');
                } else {
                    push_blank(&mut out, c);
                }
            }
            Mode::Single => {
                if c == '\'' {
                    mode = Mode::Code;
                }
                push_blank(&mut out, c);
            }
            Mode::Double => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    mode = Mode::Code;
                }
                out.push(c);
            }
            Mode::Code => {
                if escaped {
                    escaped = false;
                    out.push(c);
                } else if c == '\\' {
                    escaped = true;
                    out.push(c);
                } else if c == '\'' {
                    mode = Mode::Single;
                    push_blank(&mut out, c);
                } else if c == '"' {
                    mode = Mode::Double;
                    out.push(c);
                } else if c == '#' && prev.is_none_or(|p| p.is_whitespace() || p == ';') {
                    mode = Mode::Comment;
                    push_blank(&mut out, c);
                } else {
                    out.push(c);
                }
            }
        }
        prev = Some(c);
    }

    out
}

fn push_blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}
