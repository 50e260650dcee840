//! Script tokenizer.
//!
//! Turns raw script text into an ordered sequence of token spans over an
//! owned byte buffer, in three passes:
//!
//! 1. Rewrite: resolve `\x` escapes, toggle string mode on `"`, drop
//!    `%`-comments, and replace whitespace/operator characters with
//!    single-byte markers.
//! 2. Collapse: run-length collapse adjacent boundary markers and count
//!    tokens.
//! 3. Materialize: build the token span table; marker bytes become NULs so
//!    the buffer holds exactly the consumed text.
//!
//! Operator tokens (`| + - * = > ( ) ,`) are synthetic: they reference a
//! static one-character table instead of the script buffer, because the
//! marker byte left in the buffer is not printable.
//!
//! Marker bytes live below 0x20, so they cannot occur in script text outside
//! quoted strings (anything ≤ space is whitespace there).  A quoted string
//! containing a raw control byte below 0x0B would collide with the markers;
//! this is a documented representational assumption, not a validated one.

use std::fmt;

/// The operator characters that tokenize to synthetic one-char tokens.
pub const OPERATOR_CHARS: &[u8; 9] = b"|+-*=>(),";

/// Boundary marker: whitespace run or string-quote toggle.
const BOUNDARY: u8 = 0x01;
/// Operator markers occupy `OP_BASE .. OP_BASE + OPERATOR_CHARS.len()`.
const OP_BASE: u8 = 0x02;

// ── Span ──────────────────────────────────────────────────────────────────

/// One token: either a span into the script buffer or a synthetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// Ordinary text, `buf[off..off + len]`.
    Text { off: usize, len: usize },
    /// Index into [`OPERATOR_CHARS`].
    Op(usize),
}

// ── SyntaxError ───────────────────────────────────────────────────────────

/// A grammar violation, bad literal, out-of-range id, or exhausted resource
/// table.  Aborts the current pass immediately; carries the next few tokens
/// as context.
#[derive(Debug, Clone)]
pub struct SyntaxError {
    /// Index of the token the error was reported at.
    pub near: usize,
    pub message: String,
    /// Up to five tokens starting at `near`, space-separated.
    pub context: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error ({}) at >>{}", self.message, self.context)
    }
}

impl std::error::Error for SyntaxError {}

// ── Script ────────────────────────────────────────────────────────────────

/// A tokenized script: the rewritten byte buffer plus the token span table.
///
/// The buffer is immutable once tokenization finishes; tokens borrow from it
/// for their whole lifetime.  Token order is lexical order and is never
/// reordered.
#[derive(Debug, Clone)]
pub struct Script {
    buf: Vec<u8>,
    tokens: Vec<Span>,
}

impl Script {
    /// Tokenize script source text.
    pub fn tokenize(src: &str) -> Script {
        let marked = mark(src.as_bytes());
        let (mut buf, count) = collapse(&marked);
        let tokens = materialize(&mut buf, count);
        buf.shrink_to_fit();
        Script { buf, tokens }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Raw bytes of token `i`.  Panics if out of range; callers bound-check
    /// with [`Script::need`] or [`Script::token_eq`] first.
    pub fn token_bytes(&self, i: usize) -> &[u8] {
        match self.tokens[i] {
            Span::Text { off, len } => &self.buf[off..off + len],
            Span::Op(idx) => &OPERATOR_CHARS[idx..=idx],
        }
    }

    /// Token `i` as text (lossy for non-UTF-8 payload bytes).
    pub fn token_str(&self, i: usize) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.token_bytes(i))
    }

    /// `true` if token `i` exists and equals `s` byte for byte.
    pub fn token_eq(&self, i: usize, s: &str) -> bool {
        i < self.tokens.len() && self.token_bytes(i) == s.as_bytes()
    }

    /// The operator character of token `i`, if it is a synthetic operator.
    pub fn op_at(&self, i: usize) -> Option<u8> {
        match self.tokens.get(i) {
            Some(&Span::Op(idx)) => Some(OPERATOR_CHARS[idx]),
            _ => None,
        }
    }

    /// Index of the next token equal to `s`, starting at `from`.
    pub fn find_token(&self, from: usize, s: &str) -> Option<usize> {
        (from..self.tokens.len()).find(|&i| self.token_eq(i, s))
    }

    /// Error if token `i` does not exist ("end of text").
    pub fn need(&self, i: usize) -> Result<(), SyntaxError> {
        if i < self.tokens.len() {
            Ok(())
        } else {
            Err(self.error(i, "end of text"))
        }
    }

    /// Build a [`SyntaxError`] at token `i` with the next tokens as context.
    pub fn error(&self, i: usize, message: &str) -> SyntaxError {
        let mut context = String::new();
        for j in i..(i + 5).min(self.tokens.len()) {
            if !context.is_empty() {
                context.push(' ');
            }
            context.push_str(&self.token_str(j));
        }
        if context.is_empty() {
            context.push_str("<end>");
        }
        SyntaxError {
            near: i,
            message: message.to_owned(),
            context,
        }
    }

    /// Render the token sequence back to parseable text.  Tokens containing
    /// whitespace, operator characters, or `%` are re-quoted.  Tokenizing the
    /// result yields the same token sequence.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for i in 0..self.tokens.len() {
            if i > 0 {
                out.push(' ');
            }
            let text = self.token_str(i);
            let needs_quotes = self.op_at(i).is_none()
                && text.bytes().any(|b| {
                    b <= b' '
                        || b == b'%'
                        || b == b'"'
                        || b == b'\\'
                        || OPERATOR_CHARS.contains(&b)
                });
            if needs_quotes {
                out.push('"');
                for ch in text.chars() {
                    if ch == '"' || ch == '\\' {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push('"');
            } else {
                out.push_str(&text);
            }
        }
        out
    }
}

// ── Pass 1: escape / quote / comment / operator marking ───────────────────

fn mark(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut in_str = false;
    let mut p = 0;

    while p < src.len() {
        let b = src[p];
        if b == b'\\' {
            // Next byte is quoted; copy it, consuming the backslash.
            if p + 1 < src.len() {
                out.push(src[p + 1]);
                p += 1;
            }
        } else if b == b'"' {
            in_str = !in_str;
            out.push(BOUNDARY);
        } else if b == b'%' && !in_str {
            // Comment to end of line; the newline itself is re-examined as
            // whitespace on the next iteration.
            while p + 1 < src.len() && src[p + 1] != b'\n' {
                p += 1;
            }
        } else if !in_str && b <= b' ' {
            out.push(BOUNDARY);
        } else if !in_str {
            match OPERATOR_CHARS.iter().position(|&c| c == b) {
                Some(idx) => out.push(OP_BASE + idx as u8),
                None => out.push(b),
            }
        } else {
            out.push(b);
        }
        p += 1;
    }
    out
}

// ── Pass 2: collapse boundaries and count tokens ──────────────────────────

fn collapse(marked: &[u8]) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(marked.len());
    let mut in_text = false;
    let mut count = 0;

    for &b in marked {
        if b == BOUNDARY {
            if in_text {
                out.push(BOUNDARY);
                in_text = false;
            }
        } else if is_op_marker(b) {
            // An operator is both a token and a boundary for its neighbours.
            out.push(b);
            in_text = false;
            count += 1;
        } else {
            if !in_text {
                in_text = true;
                count += 1;
            }
            out.push(b);
        }
    }
    (out, count)
}

fn is_op_marker(b: u8) -> bool {
    (OP_BASE..OP_BASE + OPERATOR_CHARS.len() as u8).contains(&b)
}

// ── Pass 3: materialize token spans ───────────────────────────────────────

fn materialize(buf: &mut [u8], count: usize) -> Vec<Span> {
    let mut tokens = Vec::with_capacity(count);
    let mut start: Option<usize> = None;

    for p in 0..buf.len() {
        let b = buf[p];
        if b == BOUNDARY || is_op_marker(b) {
            if let Some(s) = start.take() {
                tokens.push(Span::Text { off: s, len: p - s });
            }
            if is_op_marker(b) {
                tokens.push(Span::Op((b - OP_BASE) as usize));
            }
            buf[p] = 0; // restore a terminator in place of the marker
        } else if start.is_none() {
            start = Some(p);
        }
    }
    if let Some(s) = start {
        tokens.push(Span::Text { off: s, len: buf.len() - s });
    }
    debug_assert_eq!(tokens.len(), count);
    tokens
}

// ── Tests ─────────────────────────────────────────────────────────────────
