//! Scans a generated INSERT script for values repeated within one column.

use std::{collections::HashMap, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};
use regex::Regex;

use crate::{
    cli::DuplicatesArgs,
    headers::fold_header,
    io_utils,
    sql::{TupleError, parse_tuple},
    table,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntry {
    pub value: String,
    /// 1-based line numbers where each tuple starts.
    pub lines: Vec<usize>,
}

impl DuplicateEntry {
    pub fn count(&self) -> usize {
        self.lines.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    pub table: String,
    pub column: String,
    pub rows: usize,
    pub malformed: usize,
    pub duplicates: Vec<DuplicateEntry>,
}

impl DuplicateReport {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicates.is_empty()
    }
}

fn insert_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*INSERT\s+INTO\s+(\S+)\s*\(([^)]*)\)\s*VALUES")
            .unwrap_or_else(|err| panic!("invalid INSERT pattern: {err}"))
    })
}

pub fn scan(sql: &str, column: &str) -> Result<DuplicateReport> {
    let wanted = fold_header(column);
    let mut lines = sql.lines().enumerate().map(|(idx, line)| (idx + 1, line));

    let (table_name, position) = loop {
        let Some((_, line)) = lines.next() else {
            bail!("No INSERT INTO ... VALUES statement found");
        };
        let Some(captures) = insert_pattern().captures(line) else {
            continue;
        };
        let columns = captures[2]
            .split(',')
            .map(|name| name.trim().trim_matches('"').to_string())
            .collect::<Vec<_>>();
        let position = columns
            .iter()
            .position(|name| fold_header(name) == wanted)
            .ok_or_else(|| {
                anyhow!(
                    "Column '{column}' not found in INSERT column list ({})",
                    columns.join(", ")
                )
            })?;
        break (captures[1].to_string(), position);
    };

    let mut report = DuplicateReport {
        table: table_name,
        column: column.to_string(),
        ..DuplicateReport::default()
    };
    let mut hits: HashMap<String, Vec<usize>> = HashMap::new();
    let mut pending: Option<(usize, String)> = None;

    for (line_no, line) in lines {
        let (start, text) = match pending.take() {
            Some((start, mut buffered)) => {
                buffered.push('\n');
                buffered.push_str(line);
                (start, buffered)
            }
            None if line.trim_start().starts_with('(') => (line_no, line.to_string()),
            None => continue,
        };
        match parse_tuple(&text) {
            Ok(literals) => {
                report.rows += 1;
                if let Some(value) = literals.get(position).and_then(|lit| lit.as_text()) {
                    hits.entry(value.to_string()).or_default().push(start);
                }
            }
            // Quoted text may legitimately span lines.
            Err(TupleError::UnterminatedQuote) => pending = Some((start, text)),
            Err(err) => {
                warn!("Line {start}: could not parse tuple: {err}");
                report.malformed += 1;
            }
        }
    }
    if let Some((start, _)) = pending {
        warn!("Line {start}: tuple never closes before end of file");
        report.malformed += 1;
    }

    let mut duplicates = hits
        .into_iter()
        .filter(|(_, lines)| lines.len() > 1)
        .map(|(value, lines)| DuplicateEntry { value, lines })
        .collect::<Vec<_>>();
    duplicates.sort_by(|a, b| {
        b.count()
            .cmp(&a.count())
            .then_with(|| a.value.to_lowercase().cmp(&b.value.to_lowercase()))
            .then_with(|| a.value.cmp(&b.value))
    });
    report.duplicates = duplicates;
    Ok(report)
}

pub fn execute(args: &DuplicatesArgs) -> Result<()> {
    let bytes = io_utils::read_input(&args.input)?;
    let sql = io_utils::decode_bytes(&bytes, encoding_rs::UTF_8)
        .with_context(|| format!("Decoding {:?}", args.input))?;
    let report =
        scan(&sql, &args.column).with_context(|| format!("Scanning {:?}", args.input))?;

    info!(
        "Parsed {} row(s) of {} ({} malformed)",
        report.rows, report.table, report.malformed
    );
    println!("Total rows parsed: {}", report.rows);
    println!(
        "Duplicate {} values: {}",
        report.column,
        report.duplicates.len()
    );
    if report.has_duplicates() {
        let headers = vec![
            report.column.clone(),
            "occurrences".to_string(),
            "lines".to_string(),
        ];
        let rows = report
            .duplicates
            .iter()
            .map(|entry| {
                vec![
                    entry.value.clone(),
                    entry.count().to_string(),
                    entry
                        .lines
                        .iter()
                        .map(|line| line.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
        if args.fail_on_duplicates {
            bail!(
                "{} duplicate value(s) found in column '{}'",
                report.duplicates.len(),
                report.column
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "\
-- Generated SQL INSERT statements for admin_users table
-- Generated on: 2025-11-01 10:00:00

INSERT INTO admin_users (user_id, username, role) VALUES
(1, 'jdoe', 'hr_admin'),
(2, 'asmith', 'it_admin'),
(3, 'jdoe', 'super_admin'),
(4, 'O''Brien', 'hr_admin'),
(5, 'o''brien', 'hr_admin'),
(6, 'jdoe', 'hr_admin'),
(7, 'O''Brien', 'it_admin');

-- End of INSERT statements
-- Total records: 7
";

    #[test]
    fn scan_groups_repeated_values_with_line_numbers() {
        let report = scan(SCRIPT, "username").unwrap();
        assert_eq!(report.table, "admin_users");
        assert_eq!(report.rows, 7);
        assert_eq!(report.malformed, 0);
        assert_eq!(
            report.duplicates,
            vec![
                DuplicateEntry {
                    value: "jdoe".to_string(),
                    lines: vec![5, 7, 10],
                },
                DuplicateEntry {
                    value: "O'Brien".to_string(),
                    lines: vec![8, 11],
                },
            ]
        );
    }

    #[test]
    fn scan_matches_column_names_loosely_and_ignores_nulls() {
        let sql = "INSERT INTO users (payroll_number, department) VALUES\n\
                   ('A1', NULL),\n\
                   ('A2', NULL);\n";
        let report = scan(sql, "Department").unwrap();
        assert_eq!(report.rows, 2);
        assert!(!report.has_duplicates());
    }

    #[test]
    fn scan_joins_tuples_with_embedded_line_breaks() {
        let sql = "INSERT INTO t (id, note) VALUES\n\
                   ('a', 'first\nsecond'),\n\
                   ('a', 'single');\n";
        let report = scan(sql, "id").unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.duplicates[0].lines, vec![2, 4]);
    }

    #[test]
    fn scan_reports_unknown_column() {
        let err = scan(SCRIPT, "email").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn scan_requires_an_insert_statement() {
        assert!(scan("-- nothing here\n", "id").is_err());
    }
}
