//! Per-row policy resolution.
//!
//! [`RowPlan`] binds a [`Profile`] to the header row of one input file.
//! [`RowResolver`] then turns each decoded record into the literals of one
//! output row, or a [`RowDefect`] explaining why the row cannot be inserted.
//!
//! Natural keys are resolved last, after every other column validated, so a
//! row that is skipped for an unrelated reason never claims a key.

use anyhow::{Result, bail};
use log::{debug, warn};
use thiserror::Error;

use crate::{
    data::{FieldType, Value, parse_field_value},
    dates::{DateError, DateResolution, parse_date, resolve_date},
    headers::HeaderIndex,
    keys::{KeyDecision, KeyMode, KeyRegistry, KeyRejection},
    normalize::normalize,
    profile::{ColumnSource, Profile, fold_role},
    sql::render_literal,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowDefect {
    #[error("missing required value for column '{column}'")]
    MissingField { column: String },
    #[error("column '{column}' expects an integer but found '{value}'")]
    InvalidInteger { column: String, value: String },
    #[error("column '{column}': {reason}")]
    InvalidDate { column: String, reason: DateError },
    #[error("missing role")]
    MissingRole,
    #[error("role '{0}' is not allowed by this profile")]
    UnknownRole(String),
    #[error("missing natural key")]
    MissingKey,
    #[error("duplicate natural key '{0}'")]
    DuplicateKey(String),
}

impl RowDefect {
    /// Stable label used when tallying skipped rows.
    pub fn kind(&self) -> &'static str {
        match self {
            RowDefect::MissingField { .. } => "missing required field",
            RowDefect::InvalidInteger { .. } => "invalid integer",
            RowDefect::InvalidDate { .. } => "invalid date",
            RowDefect::MissingRole => "missing role",
            RowDefect::UnknownRole(_) => "unknown role",
            RowDefect::MissingKey => "missing key",
            RowDefect::DuplicateKey(_) => "duplicate key",
        }
    }
}

/// A substitution made while keeping a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    PlaceholderKey(String),
    DisambiguatedKey { original: String, key: String },
    DateFallback { column: String, reason: DateError },
    DateCoerced { column: String, raw: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub literals: Vec<String>,
    pub corrections: Vec<Correction>,
}

#[derive(Debug, Clone)]
struct PlannedColumn<'a> {
    name: &'a str,
    source: &'a ColumnSource,
    position: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RowPlan<'a> {
    profile: &'a Profile,
    key_position: Option<usize>,
    role_position: Option<usize>,
    columns: Vec<PlannedColumn<'a>>,
}

impl<'a> RowPlan<'a> {
    /// Resolves header aliases to positions. A required column that is absent
    /// from the file is fatal, as is a missing key column in `skip` mode.
    pub fn compile(profile: &'a Profile, headers: &HeaderIndex) -> Result<Self> {
        let key_position = headers.find(&profile.key.headers);
        match (key_position, profile.key.mode) {
            (Some(position), _) => debug!(
                "Key column '{}' at position {position}",
                headers.label(position).unwrap_or_default()
            ),
            (None, KeyMode::Skip) => bail!(
                "Key column not found; expected one of {:?}",
                profile.key.headers
            ),
            (None, KeyMode::Disambiguate) => warn!(
                "Key column not found (expected one of {:?}); every row gets a placeholder key",
                profile.key.headers
            ),
        }

        let role_position = match &profile.role {
            Some(role) => {
                let position = headers.find(&role.headers);
                if position.is_none() {
                    bail!("Role column not found; expected one of {:?}", role.headers);
                }
                position
            }
            None => None,
        };

        let mut columns = Vec::with_capacity(profile.columns.len());
        for column in &profile.columns {
            let position = match column.source.headers() {
                Some(aliases) => {
                    let position = headers.find(aliases);
                    match position {
                        Some(idx) => debug!(
                            "Column '{}' <- '{}' (position {idx})",
                            column.name,
                            headers.label(idx).unwrap_or_default()
                        ),
                        None if matches!(column.source, ColumnSource::Field { required: true, .. }) => {
                            bail!(
                                "Required column '{}' not found; expected one of {:?}",
                                column.name,
                                aliases
                            )
                        }
                        None => warn!(
                            "No source header for column '{}' (expected one of {:?}); using its default",
                            column.name, aliases
                        ),
                    }
                    position
                }
                None => None,
            };
            columns.push(PlannedColumn {
                name: &column.name,
                source: &column.source,
                position,
            });
        }

        Ok(Self {
            profile,
            key_position,
            role_position,
            columns,
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    fn cell(&self, record: &[String], position: Option<usize>) -> Option<String> {
        let raw = position.and_then(|idx| record.get(idx))?;
        normalize(raw, &self.profile.sentinels)
    }

    fn raw_cell<'r>(&self, record: &'r [String], position: Option<usize>) -> &'r str {
        position
            .and_then(|idx| record.get(idx))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Holds the run's duplicate-key set alongside the plan.
pub struct RowResolver<'a> {
    plan: RowPlan<'a>,
    keys: KeyRegistry,
}

enum Slot {
    Ready(Option<Value>),
    Key,
    Email { domain: String, lowercase: bool },
}

impl<'a> RowResolver<'a> {
    pub fn new(plan: RowPlan<'a>) -> Self {
        let policy = &plan.profile.key;
        let keys = KeyRegistry::new(
            policy.mode,
            &policy.placeholder_prefix,
            &policy.duplicate_prefix,
        );
        Self { plan, keys }
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// `ordinal` is the 1-based data row number.
    pub fn resolve(&mut self, record: &[String], ordinal: usize) -> Result<ResolvedRow, RowDefect> {
        let mut corrections = Vec::new();
        let role = self.resolve_role(record)?;

        let mut slots = Vec::with_capacity(self.plan.columns.len());
        for column in &self.plan.columns {
            let slot = match column.source {
                ColumnSource::Key => Slot::Key,
                ColumnSource::Email { domain, lowercase } => Slot::Email {
                    domain: domain.clone(),
                    lowercase: *lowercase,
                },
                ColumnSource::Field {
                    required,
                    datatype,
                    default,
                    when_role,
                    ..
                } => {
                    let overridden = role.as_deref().and_then(|role| {
                        when_role
                            .iter()
                            .find(|(candidate, _)| fold_role(candidate) == role)
                            .map(|(_, value)| value)
                    });
                    let value = match overridden {
                        Some(value) => value.clone().map(Value::Text),
                        None => self.field_value(
                            record,
                            column,
                            *required,
                            *datatype,
                            default.as_deref(),
                        )?,
                    };
                    Slot::Ready(value)
                }
                ColumnSource::Role => {
                    let raw = self.plan.cell(record, self.plan.role_position);
                    Slot::Ready(raw.map(Value::Text))
                }
                ColumnSource::Date {
                    formats, fallback, ..
                } => {
                    let raw = self.plan.raw_cell(record, column.position);
                    let resolution = resolve_date(parse_date(raw, formats), *fallback);
                    match resolution {
                        DateResolution::Parsed(date) => Slot::Ready(Some(Value::Date(date))),
                        DateResolution::Coerced(date) => {
                            corrections.push(Correction::DateCoerced {
                                column: column.name.to_string(),
                                raw: raw.trim().to_string(),
                            });
                            Slot::Ready(Some(Value::Date(date)))
                        }
                        DateResolution::Fallback { date, reason } => {
                            corrections.push(Correction::DateFallback {
                                column: column.name.to_string(),
                                reason,
                            });
                            Slot::Ready(Some(Value::Date(date)))
                        }
                        DateResolution::Rejected(reason) => {
                            return Err(RowDefect::InvalidDate {
                                column: column.name.to_string(),
                                reason,
                            });
                        }
                    }
                }
                ColumnSource::Password => Slot::Ready(Some(Value::Text(
                    self.plan.profile.default_password.clone(),
                ))),
                ColumnSource::Text { value } => Slot::Ready(Some(Value::Text(value.clone()))),
                ColumnSource::Integer { value } => Slot::Ready(Some(Value::Integer(*value))),
                ColumnSource::Boolean { value, style } => {
                    Slot::Ready(Some(Value::Boolean(*value, *style)))
                }
                ColumnSource::Absent => Slot::Ready(None),
            };
            slots.push(slot);
        }

        let key = self.resolve_key(record, ordinal, &mut corrections)?;
        let literals = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Ready(value) => render_literal(value.as_ref()),
                Slot::Key => render_literal(Some(&Value::Text(key.clone()))),
                Slot::Email { domain, lowercase } => {
                    let email = format!("{key}@{domain}");
                    let email = if lowercase { email.to_lowercase() } else { email };
                    render_literal(Some(&Value::Text(email)))
                }
            })
            .collect();

        Ok(ResolvedRow {
            literals,
            corrections,
        })
    }

    fn resolve_role(&self, record: &[String]) -> Result<Option<String>, RowDefect> {
        let Some(policy) = &self.plan.profile.role else {
            return Ok(None);
        };
        let role = self
            .plan
            .cell(record, self.plan.role_position)
            .ok_or(RowDefect::MissingRole)?;
        let folded = fold_role(&role);
        if !policy.allows(&folded) {
            return Err(RowDefect::UnknownRole(role));
        }
        Ok(Some(folded))
    }

    fn field_value(
        &self,
        record: &[String],
        column: &PlannedColumn<'_>,
        required: bool,
        datatype: FieldType,
        default: Option<&str>,
    ) -> Result<Option<Value>, RowDefect> {
        match self.plan.cell(record, column.position) {
            Some(text) => parse_field_value(&text, datatype)
                .map(Some)
                .ok_or_else(|| RowDefect::InvalidInteger {
                    column: column.name.to_string(),
                    value: text,
                }),
            None if required => Err(RowDefect::MissingField {
                column: column.name.to_string(),
            }),
            None => Ok(default.map(|literal| Value::Text(literal.to_string()))),
        }
    }

    fn resolve_key(
        &mut self,
        record: &[String],
        ordinal: usize,
        corrections: &mut Vec<Correction>,
    ) -> Result<String, RowDefect> {
        let policy = &self.plan.profile.key;
        let candidate = self
            .plan
            .cell(record, self.plan.key_position)
            .map(|raw| policy.synthesize(&raw));
        match self.keys.resolve(candidate.as_deref(), ordinal) {
            KeyDecision::Accepted(key) => Ok(key),
            KeyDecision::Placeholder(key) => {
                corrections.push(Correction::PlaceholderKey(key.clone()));
                Ok(key)
            }
            KeyDecision::Disambiguated { original, key } => {
                corrections.push(Correction::DisambiguatedKey {
                    original,
                    key: key.clone(),
                });
                Ok(key)
            }
            KeyDecision::Rejected(KeyRejection::Missing) => Err(RowDefect::MissingKey),
            KeyDecision::Rejected(KeyRejection::Duplicate(key)) => {
                Err(RowDefect::DuplicateKey(key))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn users_resolver<'a>(profile: &'a Profile, headers: &[&str]) -> RowResolver<'a> {
        let index = HeaderIndex::new(&strings(headers));
        RowResolver::new(RowPlan::compile(profile, &index).unwrap())
    }

    const USER_HEADERS: &[&str] = &[
        "Payroll Number",
        "Surname",
        "First Name",
        "Other Names",
        "Birth Date",
        "ID Number",
    ];

    #[test]
    fn valid_user_row_renders_in_table_order() {
        let profile = Profile::builtin("users").unwrap();
        let mut resolver = users_resolver(&profile, USER_HEADERS);
        let row = resolver
            .resolve(
                &strings(&["A1001", "O'Brien", "Jane", "", "03/04/1985", "12345678"]),
                1,
            )
            .unwrap();
        assert_eq!(
            row.literals,
            strings(&[
                "'A1001'",
                "'O''Brien'",
                "'Jane'",
                "NULL",
                "'a1001@mombasa.go.ke'",
                "NULL",
                "'1985-04-03'",
                "''",
                "FALSE",
                "'12345678'",
            ])
        );
        assert!(row.corrections.is_empty());
    }

    #[test]
    fn missing_required_field_skips_without_claiming_key() {
        let profile = Profile::builtin("users").unwrap();
        let mut resolver = users_resolver(&profile, USER_HEADERS);
        let err = resolver
            .resolve(&strings(&["A1", "N/A", "Jane", "", "1/1/1990", ""]), 1)
            .unwrap_err();
        assert_eq!(
            err,
            RowDefect::MissingField {
                column: "surname".into()
            }
        );
        assert!(resolver.keys().is_empty());
    }

    #[test]
    fn invalid_birthdate_without_fallback_is_a_defect() {
        let profile = Profile::builtin("users").unwrap();
        let mut resolver = users_resolver(&profile, USER_HEADERS);
        let err = resolver
            .resolve(&strings(&["A1", "Otieno", "Jane", "", "someday", ""]), 3)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid date");
    }

    #[test]
    fn placeholder_key_feeds_email_in_disambiguate_mode() {
        let mut profile = Profile::builtin("users").unwrap();
        profile.key.mode = KeyMode::Disambiguate;
        let mut resolver = users_resolver(&profile, USER_HEADERS);
        let row = resolver
            .resolve(&strings(&["", "Otieno", "Jane", "", "29/2/2021", ""]), 7)
            .unwrap();
        assert_eq!(row.literals[0], "'MISSING_00007'");
        assert_eq!(row.literals[4], "'missing_00007@mombasa.go.ke'");
        assert_eq!(row.literals[6], "'2021-02-28'");
        assert_eq!(
            row.corrections,
            vec![
                Correction::DateCoerced {
                    column: "birthdate".into(),
                    raw: "29/2/2021".into()
                },
                Correction::PlaceholderKey("MISSING_00007".into()),
            ]
        );
    }

    #[test]
    fn admin_roles_null_department_fields() {
        let profile = Profile::builtin("admins").unwrap();
        let headers = [
            "User ID",
            "Username",
            "Role",
            "First Name",
            "Last Name",
            "Department",
            "sub_department",
        ];
        let mut resolver = users_resolver(&profile, &headers);

        let it = resolver
            .resolve(
                &strings(&["4", "jdoe", "IT_Admin", "John", "Doe", "ICT", "Networks"]),
                1,
            )
            .unwrap();
        assert_eq!(it.literals[0], "4");
        assert_eq!(it.literals[4], "'IT_Admin'");
        assert_eq!(it.literals[7], "1");
        assert_eq!(it.literals[8], "NULL");
        assert_eq!(it.literals[9], "'N/A'");

        let hr = resolver
            .resolve(&strings(&["5", "amina", "hr_admin", "Amina", "Ali", "Health", "-"]), 2)
            .unwrap();
        assert_eq!(hr.literals[8], "'Health'");
        assert_eq!(hr.literals[9], "'Unknown'");
    }

    #[test]
    fn admin_rows_reject_unknown_roles_and_bad_ids() {
        let profile = Profile::builtin("admins").unwrap();
        let headers = ["User ID", "Username", "Role", "First Name", "Last Name"];
        let mut resolver = users_resolver(&profile, &headers);

        let err = resolver
            .resolve(&strings(&["1", "x", "janitor", "A", "B"]), 1)
            .unwrap_err();
        assert_eq!(err, RowDefect::UnknownRole("janitor".into()));

        let err = resolver
            .resolve(&strings(&["one", "x", "hr_admin", "A", "B"]), 2)
            .unwrap_err();
        assert_eq!(
            err,
            RowDefect::InvalidInteger {
                column: "user_id".into(),
                value: "one".into()
            }
        );

        let err = resolver
            .resolve(&strings(&["1", "x", "", "A", "B"]), 3)
            .unwrap_err();
        assert_eq!(err, RowDefect::MissingRole);
    }

    #[test]
    fn compile_fails_when_required_header_is_missing() {
        let profile = Profile::builtin("users").unwrap();
        let index = HeaderIndex::new(&strings(&["Payroll Number", "First Name"]));
        let err = RowPlan::compile(&profile, &index).unwrap_err();
        assert!(err.to_string().contains("Required column 'surname'"));
    }

    #[test]
    fn compile_fails_without_key_column_in_skip_mode() {
        let profile = Profile::builtin("users").unwrap();
        let index = HeaderIndex::new(&strings(&["Surname", "First Name"]));
        let err = RowPlan::compile(&profile, &index).unwrap_err();
        assert!(err.to_string().contains("Key column not found"));
    }

    #[test]
    fn absorbed_profile_wraps_ids_and_preserves_case() {
        let profile = Profile::builtin("absorbed-casuals").unwrap();
        let headers = ["first_name", "other_names", "surname", "ID NO", "Payroll number"];
        let mut resolver = users_resolver(&profile, &headers);
        let row = resolver
            .resolve(&strings(&["Mary", "", "Wanjiru", "998877", ""]), 1)
            .unwrap();
        assert_eq!(row.literals[0], "'TN998877HTL'");
        assert_eq!(row.literals[4], "'TN998877HTL@mombasa.go.ke'");
        assert_eq!(row.literals[6], "'1999-01-01'");
        assert_eq!(row.literals[9], "'998877'");

        let err = resolver
            .resolve(&strings(&["Tom", "", "Otieno", "-", ""]), 2)
            .unwrap_err();
        assert_eq!(
            err,
            RowDefect::MissingField {
                column: "national_id".into()
            }
        );
    }
}
