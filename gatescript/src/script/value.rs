//! Runtime value type for script expressions.
//!
//! Every value is a byte string plus a type tag: `Str` for text (quoted
//! literals, bare words, arithmetic results) and `Data` for binary payloads
//! (`#HEX` literals, message data, HTTP bodies).  Numeric operators coerce
//! through a decimal parse and reformat, like the original firmware did with
//! `atoi`/`sprintf`.

use std::fmt;

/// Type tag carried by every [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    Data,
}

/// A script runtime value: owned bytes plus a [`Kind`] tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub bytes: Vec<u8>,
    pub kind: Kind,
}

impl Default for Value {
    fn default() -> Self {
        Value { bytes: Vec::new(), kind: Kind::Str }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value { bytes: s.into().into_bytes(), kind: Kind::Str }
    }

    pub fn data(bytes: Vec<u8>) -> Value {
        Value { bytes, kind: Kind::Data }
    }

    pub fn int(n: i64) -> Value {
        Value::str(n.to_string())
    }

    /// `"1"` or `"0"`.
    pub fn bool(b: bool) -> Value {
        Value::str(if b { "1" } else { "0" })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Coerce to integer with `atoi` semantics: skip leading whitespace,
    /// optional sign, consume leading digits, 0 when none.
    pub fn as_int(&self) -> i64 {
        atoi(&self.bytes)
    }

    /// Integer truthiness: nonzero is true.
    pub fn truthy(&self) -> bool {
        self.as_int() != 0
    }

    /// The value as text (lossy for non-UTF-8 bytes).
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Byte concatenation, truncated to `max` bytes.  The result is tagged
    /// `Str` regardless of operand kinds: every binary operator produces a
    /// string-typed result, only a pass-through preserves the operand kind.
    pub fn concat(&self, rhs: &Value, max: usize) -> Value {
        let mut bytes = Vec::with_capacity((self.len() + rhs.len()).min(max));
        bytes.extend_from_slice(&self.bytes);
        bytes.extend_from_slice(&rhs.bytes);
        bytes.truncate(max);
        Value { bytes, kind: Kind::Str }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value { bytes: s.into_bytes(), kind: Kind::Str }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

fn atoi(bytes: &[u8]) -> i64 {
    let mut p = 0;
    while p < bytes.len() && bytes[p].is_ascii_whitespace() {
        p += 1;
    }
    let neg = match bytes.get(p) {
        Some(b'-') => {
            p += 1;
            true
        }
        Some(b'+') => {
            p += 1;
            false
        }
        _ => false,
    };
    let mut n: i64 = 0;
    while p < bytes.len() && bytes[p].is_ascii_digit() {
        n = n.saturating_mul(10).saturating_add((bytes[p] - b'0') as i64);
        p += 1;
    }
    if neg { -n } else { n }
}

/// Decode a `#HEXDIGITS` literal body (without the `#`).  `None` for an odd
/// digit count or a non-hex byte.
pub fn decode_hex(digits: &[u8]) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        let hi = hex_nibble(pair[0])?;
        let lo = hex_nibble(pair[1])?;
        out.push((hi << 4) | lo);
    }
    Some(out)
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
