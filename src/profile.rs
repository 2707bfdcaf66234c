//! Conversion profiles: the declarative description of one destination table.
//!
//! A profile names the table, lists its columns in insert order, and says
//! where each column's value comes from (a source header, the natural key, a
//! synthesized email, a constant, ...). Profiles are YAML documents; the
//! built-in presets under `profiles/` are compiled into the binary and can be
//! exported as a starting point for custom ones.

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    data::{BooleanStyle, FieldType},
    dates::default_date_formats,
    keys::{DEFAULT_DUPLICATE_PREFIX, DEFAULT_PLACEHOLDER_PREFIX, KeyMode},
    normalize::SentinelSet,
};

pub const DEFAULT_PROFILE: &str = "users";

const BUILTIN_PROFILES: &[(&str, &str)] = &[
    ("users", include_str!("../profiles/users.yaml")),
    ("admins", include_str!("../profiles/admins.yaml")),
    (
        "hospital-casuals",
        include_str!("../profiles/hospital-casuals.yaml"),
    ),
    (
        "absorbed-casuals",
        include_str!("../profiles/absorbed-casuals.yaml"),
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub table: String,
    #[serde(default)]
    pub sentinels: SentinelSet,
    #[serde(default)]
    pub default_password: String,
    pub key: KeyPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RolePolicy>,
    pub columns: Vec<ColumnSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPolicy {
    pub headers: Vec<String>,
    #[serde(default)]
    pub mode: KeyMode,
    /// Wraps the raw identifier, e.g. `TN` + id + `HTL`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub suffix: String,
    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,
    #[serde(default = "default_duplicate_prefix")]
    pub duplicate_prefix: String,
}

impl KeyPolicy {
    pub fn synthesize(&self, raw: &str) -> String {
        format!("{}{}{}", self.prefix, raw, self.suffix)
    }
}

fn default_placeholder_prefix() -> String {
    DEFAULT_PLACEHOLDER_PREFIX.to_string()
}

fn default_duplicate_prefix() -> String {
    DEFAULT_DUPLICATE_PREFIX.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePolicy {
    pub headers: Vec<String>,
    /// Accepted roles (case-insensitive); empty accepts any role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl RolePolicy {
    pub fn allows(&self, folded_role: &str) -> bool {
        self.allowed.is_empty()
            || self
                .allowed
                .iter()
                .any(|role| fold_role(role) == folded_role)
    }
}

pub fn fold_role(role: &str) -> String {
    role.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(flatten)]
    pub source: ColumnSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// The resolved natural key.
    Key,
    /// `<key>@<domain>`.
    Email {
        domain: String,
        #[serde(default = "default_true")]
        lowercase: bool,
    },
    Field {
        headers: Vec<String>,
        #[serde(default)]
        required: bool,
        #[serde(default, skip_serializing_if = "FieldType::is_text")]
        datatype: FieldType,
        /// Literal used when the source value is absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<String>,
        /// Per-role overrides; `~` renders NULL.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        when_role: BTreeMap<String, Option<String>>,
    },
    Role,
    Date {
        headers: Vec<String>,
        #[serde(default = "default_date_formats")]
        formats: Vec<String>,
        /// Substituted for empty or unparseable dates; rows are skipped when unset.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<NaiveDate>,
    },
    Password,
    Text {
        value: String,
    },
    Integer {
        value: i64,
    },
    Boolean {
        value: bool,
        #[serde(default)]
        style: BooleanStyle,
    },
    Absent,
}

fn default_true() -> bool {
    true
}

impl ColumnSource {
    pub fn headers(&self) -> Option<&[String]> {
        match self {
            ColumnSource::Field { headers, .. } | ColumnSource::Date { headers, .. } => {
                Some(headers)
            }
            _ => None,
        }
    }
}

impl Profile {
    pub fn builtin(name: &str) -> Result<Self> {
        let (_, raw) = BUILTIN_PROFILES
            .iter()
            .find(|(builtin, _)| builtin.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                anyhow!(
                    "Unknown profile '{name}'. Available profiles: {}",
                    builtin_names().join(", ")
                )
            })?;
        Self::from_yaml(raw).with_context(|| format!("Parsing built-in profile '{name}'"))
    }

    pub fn builtins() -> Result<Vec<Self>> {
        BUILTIN_PROFILES
            .iter()
            .map(|(name, _)| Self::builtin(name))
            .collect()
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let profile: Profile = serde_yaml::from_str(raw).context("Parsing profile YAML")?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening profile file {path:?}"))?;
        let profile: Profile = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing profile YAML {path:?}"))?;
        profile
            .validate()
            .with_context(|| format!("Validating profile {path:?}"))?;
        Ok(profile)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing profile to YAML")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        std::fs::write(path, yaml).with_context(|| format!("Writing profile to {path:?}"))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.table.trim().is_empty(), "Profile '{}' has no table name", self.name);
        ensure!(
            !self.columns.is_empty(),
            "Profile '{}' does not define any columns",
            self.name
        );
        ensure!(
            !self.key.headers.is_empty(),
            "Profile '{}' must list at least one key header",
            self.name
        );

        let mut seen = HashSet::new();
        let mut key_columns = 0usize;
        for column in &self.columns {
            let name = column.name.trim();
            ensure!(!name.is_empty(), "Profile '{}' has a column without a name", self.name);
            if !seen.insert(name.to_ascii_lowercase()) {
                bail!("Column '{name}' appears more than once in profile '{}'", self.name);
            }
            match &column.source {
                ColumnSource::Key => key_columns += 1,
                ColumnSource::Role if self.role.is_none() => {
                    bail!("Column '{name}' uses the role but the profile has no role section")
                }
                ColumnSource::Field { when_role, .. }
                    if !when_role.is_empty() && self.role.is_none() =>
                {
                    bail!("Column '{name}' has role overrides but the profile has no role section")
                }
                ColumnSource::Date { formats, .. } if formats.is_empty() => {
                    bail!("Date column '{name}' must list at least one format")
                }
                ColumnSource::Email { domain, .. } if domain.trim().is_empty() => {
                    bail!("Email column '{name}' needs a domain")
                }
                _ => {}
            }
            if let Some(headers) = column.source.headers() {
                ensure!(!headers.is_empty(), "Column '{name}' must list at least one header");
            }
        }
        ensure!(
            key_columns == 1,
            "Profile '{}' must contain exactly one key column (found {key_columns})",
            self.name
        );
        Ok(())
    }
}

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_PROFILES.iter().map(|(name, _)| *name).collect()
}
