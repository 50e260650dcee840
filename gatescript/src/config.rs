//! `config <key> <value>` extraction pass.
//!
//! Scripts may carry device settings alongside their rules.  The statement
//! driver only checks the token shape; this pass collects the pairs so the
//! host can apply them before the first dispatch.  A key given twice keeps
//! its last value.

use crate::script::token::Script;

/// Settings collected from a script's `config` statements.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pairs: Vec<(String, String)>,
}

impl Config {
    /// Scan `script` for `config` statements.  The scan is shape-blind: it
    /// does not validate the surrounding rules, so it can run before (or
    /// without) a full syntax check.
    pub fn from_script(script: &Script) -> Config {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut i = 0;
        while let Some(at) = script.find_token(i, "config") {
            if at + 2 >= script.token_count() {
                break;
            }
            let key = script.token_str(at + 1).into_owned();
            let value = script.token_str(at + 2).into_owned();
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(pair) => pair.1 = value,
                None => pairs.push((key, value)),
            }
            i = at + 3;
        }
        Config { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Integer setting; `default` when absent or non-numeric.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config(src: &str) -> Config {
        Config::from_script(&Script::tokenize(src))
    }

    #[test]
    fn collects_pairs_between_rules() {
        // Values with operator characters need quoting, same as anywhere
        // else in a script.
        let c = config(
            "config broker_keepalive 30 \
             on init do println up \
             config node_name \"gateway-7\"",
        );
        assert_eq!(c.get("broker_keepalive"), Some("30"));
        assert_eq!(c.get("node_name"), Some("gateway-7"));
        assert_eq!(c.get_int("broker_keepalive", 0), 30);
    }

    #[test]
    fn last_value_wins() {
        let c = config("config speed 9600 config speed 115200");
        assert_eq!(c.get("speed"), Some("115200"));
        assert_eq!(c.iter().count(), 1);
    }

    #[test]
    fn missing_key_defaults() {
        let c = config("on init do println x");
        assert!(c.is_empty());
        assert_eq!(c.get("speed"), None);
        assert_eq!(c.get_int("speed", 9600), 9600);
    }

    #[test]
    fn quoted_value_kept_whole() {
        let c = config("config motd \"hello world\"");
        assert_eq!(c.get("motd"), Some("hello world"));
    }
}
