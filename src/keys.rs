//! Natural-key uniqueness for a single conversion run.
//!
//! Every key that ends up in the batch passes through [`KeyRegistry::resolve`],
//! which either accepts it, synthesizes a replacement, or rejects the row
//! according to the configured [`KeyMode`].

use std::collections::HashSet;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PLACEHOLDER_PREFIX: &str = "MISSING_";
pub const DEFAULT_DUPLICATE_PREFIX: &str = "DUP_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum KeyMode {
    /// Drop rows whose key is missing or already used
    #[default]
    Skip,
    /// Substitute placeholder keys and rewrite duplicates
    Disambiguate,
}

impl KeyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::Skip => "skip",
            KeyMode::Disambiguate => "disambiguate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyDecision {
    Accepted(String),
    Placeholder(String),
    Disambiguated { original: String, key: String },
    Rejected(KeyRejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyRejection {
    Missing,
    Duplicate(String),
}

impl KeyDecision {
    pub fn key(&self) -> Option<&str> {
        match self {
            KeyDecision::Accepted(key)
            | KeyDecision::Placeholder(key)
            | KeyDecision::Disambiguated { key, .. } => Some(key),
            KeyDecision::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyRegistry {
    mode: KeyMode,
    placeholder_prefix: String,
    duplicate_prefix: String,
    seen: HashSet<String>,
}

impl KeyRegistry {
    pub fn new(mode: KeyMode, placeholder_prefix: &str, duplicate_prefix: &str) -> Self {
        Self {
            mode,
            placeholder_prefix: placeholder_prefix.to_string(),
            duplicate_prefix: duplicate_prefix.to_string(),
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// `ordinal` is the 1-based data row number used in synthesized keys.
    pub fn resolve(&mut self, candidate: Option<&str>, ordinal: usize) -> KeyDecision {
        match (candidate, self.mode) {
            (Some(key), _) if !self.seen.contains(key) => {
                self.seen.insert(key.to_string());
                KeyDecision::Accepted(key.to_string())
            }
            (Some(key), KeyMode::Skip) => {
                KeyDecision::Rejected(KeyRejection::Duplicate(key.to_string()))
            }
            (Some(key), KeyMode::Disambiguate) => {
                let base = format!("{}{}_{:05}", self.duplicate_prefix, key, ordinal);
                KeyDecision::Disambiguated {
                    original: key.to_string(),
                    key: self.claim(base),
                }
            }
            (None, KeyMode::Skip) => KeyDecision::Rejected(KeyRejection::Missing),
            (None, KeyMode::Disambiguate) => {
                let base = format!("{}{:05}", self.placeholder_prefix, ordinal);
                KeyDecision::Placeholder(self.claim(base))
            }
        }
    }

    fn claim(&mut self, base: String) -> String {
        let mut key = base.clone();
        let mut attempt = 1usize;
        while self.seen.contains(&key) {
            attempt += 1;
            key = format!("{base}-{attempt}");
        }
        self.seen.insert(key.clone());
        key
    }
}
