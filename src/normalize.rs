//! Field normalization: trimming and sentinel handling.

use serde::{Deserialize, Serialize};

/// Tokens that conventionally mean "no value" in the roster exports.
pub const DEFAULT_SENTINELS: &[&str] = &["", "-", "N/A", "NA", "NULL", "null"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentinelSet(Vec<String>);

impl Default for SentinelSet {
    fn default() -> Self {
        Self(DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect())
    }
}

impl SentinelSet {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Exact match against the trimmed value.
    pub fn contains(&self, trimmed: &str) -> bool {
        self.0.iter().any(|token| token.trim() == trimmed)
    }
}

/// Trimmed text, or `None` when the value is blank or a sentinel.
pub fn normalize(raw: &str, sentinels: &SentinelSet) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || sentinels.contains(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}
