//! Locale-ambiguous date parsing.
//!
//! Roster exports mix day-first, month-first and ISO dates. [`parse_date()`]
//! tries an ordered list of chrono format strings and reports a typed
//! [`DateError`] when none applies; [`resolve_date()`] then decides between the
//! parsed value, a configured fallback constant, or rejecting the row.
//!
//! A February 29 in a non-leap year is coerced to February 28 of the same year
//! rather than rejected, but only after every candidate format failed to
//! produce a real date.
//!
//! chrono's `%Y` also accepts one or two digit years, so a `%Y` match below
//! year 1000 is discarded and two-digit years are left to an explicit `%y`
//! format (70-99 map to the 1900s, 00-69 to the 2000s).

use chrono::{
    NaiveDate,
    format::{self, Parsed, StrftimeItems},
};
use thiserror::Error;

pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

/// Day-first (four then two digit year), then month-first, then ISO passthrough.
pub const DEFAULT_DATE_FORMATS: &[&str] =
    &["%d/%m/%Y", "%d/%m/%y", "%m/%d/%Y", CANONICAL_DATE_FORMAT];

const MIN_FULL_YEAR: i32 = 1000;

pub fn default_date_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("date is empty")]
    Empty,
    #[error("'{0}' does not match any accepted date format")]
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    /// Set when a non-leap February 29 was moved to February 28.
    pub coerced: bool,
}

pub fn parse_date<S: AsRef<str>>(raw: &str, formats: &[S]) -> Result<ParsedDate, DateError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(DateError::Empty);
    }

    let mut leap_year_candidate = None;
    for fmt in formats {
        let mut parsed = Parsed::new();
        if format::parse(&mut parsed, text, StrftimeItems::new(fmt.as_ref())).is_err() {
            continue;
        }
        if parsed.year.is_some_and(|year| year < MIN_FULL_YEAR) {
            continue;
        }
        match parsed.to_naive_date() {
            Ok(date) => {
                return Ok(ParsedDate {
                    date,
                    coerced: false,
                });
            }
            Err(_) => {
                if leap_year_candidate.is_none() {
                    leap_year_candidate = non_leap_february_29(&parsed);
                }
            }
        }
    }

    leap_year_candidate
        .and_then(|year| NaiveDate::from_ymd_opt(year, 2, 28))
        .map(|date| ParsedDate {
            date,
            coerced: true,
        })
        .ok_or_else(|| DateError::Unrecognized(text.to_string()))
}

fn non_leap_february_29(parsed: &Parsed) -> Option<i32> {
    if parsed.month != Some(2) || parsed.day != Some(29) {
        return None;
    }
    let year = parsed.year.or_else(|| {
        parsed
            .year_mod_100
            .map(|short| if short < 70 { 2000 + short } else { 1900 + short })
    })?;
    (!is_leap_year(year)).then_some(year)
}

pub fn is_leap_year(year: i32) -> bool {
    NaiveDate::from_ymd_opt(year, 2, 29).is_some()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(CANONICAL_DATE_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateResolution {
    Parsed(NaiveDate),
    Coerced(NaiveDate),
    Fallback { date: NaiveDate, reason: DateError },
    Rejected(DateError),
}

impl DateResolution {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateResolution::Parsed(date)
            | DateResolution::Coerced(date)
            | DateResolution::Fallback { date, .. } => Some(*date),
            DateResolution::Rejected(_) => None,
        }
    }
}

/// Chooses what a date column receives; `fallback: None` rejects the row.
pub fn resolve_date(
    result: Result<ParsedDate, DateError>,
    fallback: Option<NaiveDate>,
) -> DateResolution {
    match (result, fallback) {
        (Ok(ParsedDate { date, coerced: false }), _) => DateResolution::Parsed(date),
        (Ok(ParsedDate { date, coerced: true }), _) => DateResolution::Coerced(date),
        (Err(reason), Some(date)) => DateResolution::Fallback { date, reason },
        (Err(reason), None) => DateResolution::Rejected(reason),
    }
}
