//! Hierarchical topic pattern matching.
//!
//! Topics are `/`-separated level strings.  A subscription filter may use
//! `+` to match exactly one level and `#` (final level only) to match the
//! remainder of the topic, including zero levels — so `a/#` matches both
//! `a/b/c` and `a` itself.

/// `true` if `topic` contains a wildcard character.
pub fn has_wildcards(topic: &str) -> bool {
    topic.contains(['+', '#'])
}

/// `true` if `filter` is a well-formed subscription filter: wildcards occupy
/// whole levels and `#` only appears as the final level.
pub fn is_valid_filter(filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        match *level {
            "#" => {
                if i != levels.len() - 1 {
                    return false;
                }
            }
            "+" => {}
            l => {
                if l.contains(['+', '#']) {
                    return false;
                }
            }
        }
    }
    true
}

/// Match `topic` against `filter`.
///
/// Assumes a well-formed filter (see [`is_valid_filter`]); a misplaced `#`
/// simply never matches.
pub fn matches(filter: &str, topic: &str) -> bool {
    let f: Vec<&str> = filter.split('/').collect();
    let t: Vec<&str> = topic.split('/').collect();

    for i in 0..f.len().max(t.len()) {
        match (f.get(i), t.get(i)) {
            (Some(&"#"), _) => return i == f.len() - 1,
            (Some(&"+"), Some(_)) => {}
            (Some(fl), Some(tl)) => {
                if fl != tl {
                    return false;
                }
            }
            // Filter exhausted with topic levels left, or the reverse.
            _ => return false,
        }
    }
    true
}

// ── Tests ─────────────────────────────────────────────────────────────────
