//! Accumulates rendered tuples and serializes them as one multi-row INSERT.
//!
//! The document is always rendered in full before anything is written, so a
//! batch is either emitted as a complete statement or replaced by an
//! explanatory comment when no rows qualified.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use itertools::Itertools;
use thiserror::Error;

use crate::sql::render_tuple;

pub const EMPTY_BATCH_COMMENT: &str = "-- No rows to insert: no valid rows were parsed from the input.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("table '{0}' has no destination columns")]
    NoColumns(String),
    #[error("row has {actual} value(s) but table '{table}' expects {expected}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },
}

/// Comment block written above the statement.
#[derive(Debug, Clone)]
pub struct BatchHeader {
    pub title: String,
    pub generated_at: NaiveDateTime,
    /// `(label, value)` pairs such as the source path and key mode.
    pub metadata: Vec<(String, String)>,
    /// Default-value policy notes, one comment line each.
    pub notes: Vec<String>,
}

impl BatchHeader {
    pub fn new(title: impl Into<String>, generated_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            generated_at,
            metadata: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((label.into(), value.into()));
        self
    }

    pub fn with_notes<I, S>(mut self, notes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notes.extend(notes.into_iter().map(Into::into));
        self
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "-- {}", single_line(&self.title));
        let _ = writeln!(
            out,
            "-- Generated on: {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S")
        );
        for (label, value) in &self.metadata {
            let _ = writeln!(out, "-- {}: {}", single_line(label), single_line(value));
        }
        for note in &self.notes {
            let _ = writeln!(out, "-- {}", single_line(note));
        }
        out.push('\n');
    }
}

// A newline inside a comment would turn the remainder into live SQL.
fn single_line(text: &str) -> String {
    text.lines().map(str::trim).join(" ")
}

#[derive(Debug, Clone)]
pub struct SqlBatch {
    table: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SqlBatch {
    pub fn new(table: impl Into<String>, columns: Vec<String>) -> Result<Self, BatchError> {
        let table = table.into();
        if columns.is_empty() {
            return Err(BatchError::NoColumns(table));
        }
        Ok(Self {
            table,
            columns,
            rows: Vec::new(),
        })
    }

    pub fn push(&mut self, literals: Vec<String>) -> Result<(), BatchError> {
        if literals.len() != self.columns.len() {
            return Err(BatchError::Arity {
                table: self.table.clone(),
                expected: self.columns.len(),
                actual: literals.len(),
            });
        }
        self.rows.push(literals);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, header: &BatchHeader) -> String {
        let mut out = String::new();
        header.render(&mut out);

        if self.rows.is_empty() {
            let _ = writeln!(out, "{EMPTY_BATCH_COMMENT}");
            return out;
        }

        let _ = writeln!(
            out,
            "INSERT INTO {} ({}) VALUES",
            self.table,
            self.columns.iter().join(", ")
        );
        let last = self.rows.len() - 1;
        for (idx, row) in self.rows.iter().enumerate() {
            let terminator = if idx == last { ';' } else { ',' };
            let _ = writeln!(out, "{}{terminator}", render_tuple(row));
        }
        out.push('\n');
        let _ = writeln!(out, "-- End of INSERT statements");
        let _ = writeln!(out, "-- Total records: {}", self.rows.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn header() -> BatchHeader {
        let generated_at = NaiveDate::from_ymd_opt(2025, 11, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        BatchHeader::new("Generated SQL INSERT statements for users table", generated_at)
            .with_metadata("Source", "roster.csv")
            .with_notes(["Default password for all users: '' (empty string)"])
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn render_emits_single_terminated_statement() {
        let mut batch = SqlBatch::new("users", columns(&["payroll_number", "surname"])).unwrap();
        batch.push(vec!["'A1'".into(), "'Otieno'".into()]).unwrap();
        batch.push(vec!["'A2'".into(), "'O''Neil'".into()]).unwrap();

        let rendered = batch.render(&header());
        let expected = "\
-- Generated SQL INSERT statements for users table
-- Generated on: 2025-11-01 09:30:00
-- Source: roster.csv
-- Default password for all users: '' (empty string)

INSERT INTO users (payroll_number, surname) VALUES
('A1', 'Otieno'),
('A2', 'O''Neil');

-- End of INSERT statements
-- Total records: 2
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn empty_batch_renders_comment_instead_of_statement() {
        let batch = SqlBatch::new("users", columns(&["payroll_number"])).unwrap();
        let rendered = batch.render(&header());
        assert!(rendered.ends_with(&format!("\n\n{EMPTY_BATCH_COMMENT}\n")));
        assert!(!rendered.contains("INSERT INTO"));
    }

    #[test]
    fn push_rejects_rows_with_wrong_arity() {
        let mut batch = SqlBatch::new("users", columns(&["a", "b"])).unwrap();
        let err = batch.push(vec!["1".into()]).unwrap_err();
        assert_eq!(
            err,
            BatchError::Arity {
                table: "users".into(),
                expected: 2,
                actual: 1
            }
        );
        assert!(batch.is_empty());
    }

    #[test]
    fn new_rejects_empty_column_list() {
        assert_eq!(
            SqlBatch::new("users", Vec::new()).unwrap_err(),
            BatchError::NoColumns("users".into())
        );
    }

    #[test]
    fn header_lines_cannot_break_out_of_comments() {
        let header = header().with_metadata("Source", "evil\nDROP TABLE users;");
        let batch = SqlBatch::new("users", columns(&["a"])).unwrap();
        let rendered = batch.render(&header);
        assert!(rendered.contains("-- Source: evil DROP TABLE users;"));
        assert!(rendered.lines().all(|line| line.is_empty() || line.starts_with("--")));
    }
}
