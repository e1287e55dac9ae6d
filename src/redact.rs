//! Redaction of sensitive card fields before payloads reach the log.

use serde_json::Value;

pub const REDACTED: &str = "******";

/// Fields that must never be logged in clear.
pub const DEFAULT_BLOCKLIST: &[&str] = &[
    "*card.token",
    "*card.exp_year",
    "*card.exp_month",
    "*card.cvv",
    "*card.number",
    "token",
    "exp_year",
    "exp_month",
    "cvv",
    "number",
];

/// One block-list entry.
///
/// - `field` (no dot): that field name at any depth.
/// - `*parent.field`: any path ending in `parent.field`.
/// - `a.b.c`: exactly that path from the document root.
///
/// Array indices are not path segments. Matching ignores ASCII case.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    anywhere: bool,
    segments: Vec<String>,
}

impl Pattern {
    fn parse(raw: &str) -> Option<Self> {
        let (anywhere, rest) = match raw.strip_prefix('*') {
            Some(rest) => (true, rest.trim_start_matches('.')),
            None => (!raw.contains('.'), raw),
        };
        let segments: Vec<String> = rest
            .split('.')
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if segments.is_empty() {
            return None;
        }
        Some(Self { anywhere, segments })
    }

    fn matches(&self, path: &[&str]) -> bool {
        if path.len() < self.segments.len() || (!self.anywhere && path.len() != self.segments.len()) {
            return false;
        }
        let tail = &path[path.len() - self.segments.len()..];
        tail.iter()
            .zip(&self.segments)
            .all(|(p, s)| p.eq_ignore_ascii_case(s))
    }
}

/// A set of field patterns whose values are replaced by [`REDACTED`].
#[derive(Debug, Clone)]
pub struct Blocklist {
    patterns: Vec<Pattern>,
}

impl Default for Blocklist {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCKLIST.iter().copied())
    }
}

impl Blocklist {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            patterns: patterns.into_iter().filter_map(Pattern::parse).collect(),
        }
    }

    fn blocks(&self, path: &[&str]) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Returns a copy of `value` with every blocked field replaced.
    pub fn redact(&self, value: &Value) -> Value {
        let mut path = Vec::new();
        self.redact_at(value, &mut path)
    }

    fn redact_at<'v>(&self, value: &'v Value, path: &mut Vec<&'v str>) -> Value {
        match value {
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, val) in map {
                    path.push(key.as_str());
                    let new_val = if self.blocks(path) {
                        Value::String(REDACTED.to_string())
                    } else {
                        self.redact_at(val, path)
                    };
                    path.pop();
                    out.insert(key.clone(), new_val);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact_at(v, path)).collect()),
            other => other.clone(),
        }
    }

    /// Redacts a raw JSON body for logging. Bodies that are not JSON are
    /// replaced by a length marker, since their content cannot be checked.
    pub fn redact_text(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => self.redact(&value).to_string(),
            Err(_) => format!("<{} bytes, not json>", text.len()),
        }
    }
}
