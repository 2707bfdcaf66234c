use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::CANONICAL_DATE_FORMAT;

/// Rendering style for boolean literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanStyle {
    /// `TRUE` / `FALSE`
    #[default]
    Keyword,
    /// `1` / `0`
    Digit,
}

/// Datatype of a value read from a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Integer,
}

impl FieldType {
    pub fn is_text(&self) -> bool {
        matches!(self, FieldType::Text)
    }
}

/// A normalized value ready for literal rendering. Absence is modelled as
/// `Option::None` by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Date(NaiveDate),
    Integer(i64),
    Boolean(bool, BooleanStyle),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format(CANONICAL_DATE_FORMAT).to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Boolean(b, BooleanStyle::Keyword) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Value::Boolean(b, BooleanStyle::Digit) => (if *b { "1" } else { "0" }).to_string(),
        }
    }

    /// Quoted values (text and dates) versus bare numerals and booleans.
    pub fn is_quoted(&self) -> bool {
        matches!(self, Value::Text(_) | Value::Date(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Converts already-normalized text to a typed value. Integer columns accept
/// spreadsheet artefacts such as `42.0`.
pub fn parse_field_value(text: &str, ty: FieldType) -> Option<Value> {
    match ty {
        FieldType::Text => Some(Value::Text(text.to_string())),
        FieldType::Integer => parse_integer(text).map(Value::Integer),
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(parsed) = text.parse::<i64>() {
        return Some(parsed);
    }
    let (whole, fraction) = text.split_once('.')?;
    if !fraction.is_empty() && fraction.chars().all(|c| c == '0') {
        whole.parse().ok()
    } else {
        None
    }
}
