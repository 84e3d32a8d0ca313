//! Helm-style `--set` override strings
//!
//! Operators pass overrides as `key=value` pairs separated by commas. A value
//! may be double-quoted, in which case it can contain bare commas, or unquoted,
//! in which case only `\,` stands for a literal comma:
//!
//! ```text
//! am=amg01:9093,amg02:9093        -> [("am", "amg01:9093,amg02:9093")]
//! am="am01,am02",es=NodePort      -> [("am", "am01,am02"), ("es", "NodePort")]
//! key=val1\,val2,other=x          -> [("key", "val1,val2"), ("other", "x")]
//! ```
//!
//! A single pair whose value is a comma-separated list is the common case, so
//! the whole input is first tried as one pair before falling back to pair-by-pair
//! matching.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

/// One pair whose value may contain commas, escaped or not
static WHOLE_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)=([A-Za-z0-9_\-+*:./\\,]+)$").expect("valid regex")
});

/// A pair with a double-quoted value
static QUOTED_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([A-Za-z0-9_]+)="(.*?)""#).expect("valid regex"));

/// A pair with an unquoted value, commas only when escaped
static PLAIN_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)=((?:[A-Za-z0-9_\-+*:./]|\\,)+)").expect("valid regex")
});

/// Ordered key/value overrides parsed from one `--set` argument
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOverride {
    pairs: Vec<(String, String)>,
}

impl SetOverride {
    /// Parse a set-string (see module docs for the grammar)
    pub fn parse(input: &str) -> Result<Self> {
        parse_set_string(input).map(|pairs| Self { pairs })
    }

    /// Pairs in input order, with escapes already removed
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as helm arguments, one `--set key=value` per pair
    ///
    /// Literal commas are re-escaped so helm keeps each value whole.
    pub fn to_helm_args(&self) -> Vec<String> {
        self.pairs
            .iter()
            .flat_map(|(key, value)| {
                [
                    "--set".to_string(),
                    format!("{}={}", key, value.replace(',', "\\,")),
                ]
            })
            .collect()
    }
}

/// Parse a set-string into ordered `(key, value)` pairs
///
/// An empty input yields no pairs.
pub fn parse_set_string(input: &str) -> Result<Vec<(String, String)>> {
    if let Some(caps) = WHOLE_PAIR.captures(input) {
        return Ok(vec![(caps[1].to_string(), unescape(&caps[2]))]);
    }

    let mut result = Vec::new();
    let mut left = input;

    while !left.is_empty() {
        let caps = QUOTED_PAIR
            .captures(left)
            .or_else(|| PLAIN_PAIR.captures(left))
            .ok_or_else(|| CoreError::SetString {
                input: input.to_string(),
                message: format!("unable to parse \"{}\"", left),
            })?;

        let consumed = caps[0].len();
        result.push((caps[1].to_string(), unescape(&caps[2])));

        let rest = &left[consumed..];
        match rest.chars().next() {
            None => left = rest,
            Some(',') => left = &rest[1..],
            Some(c) => {
                return Err(CoreError::SetString {
                    input: input.to_string(),
                    message: format!("unexpected character \"{}\"", c),
                });
            }
        }
    }

    Ok(result)
}

fn unescape(value: &str) -> String {
    value.replace("\\,", ",")
}
