//! Plain-text tables for console reports.

use std::fmt::Write as _;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers.iter().cloned(), &widths));
    let rule = widths.iter().map(|w| "-".repeat((*w).max(3)));
    let _ = writeln!(output, "{}", format_row(rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row.iter().map(|c| flatten(c)), &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row<I>(cells: I, widths: &[usize]) -> String
where
    I: Iterator<Item = String>,
{
    let line = cells
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = (*width).max(3)))
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

// Embedded line breaks would split a row across lines.
fn flatten(cell: &str) -> String {
    cell.replace(['\n', '\r', '\t'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let headers = vec!["name".to_string(), "count".to_string()];
        let rows = vec![
            vec!["jdoe".to_string(), "2".to_string()],
            vec!["a.very.long.username".to_string(), "13".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "name                  count");
        assert_eq!(lines[1], "--------------------  -----");
        assert_eq!(lines[2], "jdoe                  2");
        assert_eq!(lines[3], "a.very.long.username  13");
    }

    #[test]
    fn render_table_flattens_line_breaks() {
        let headers = vec!["note".to_string()];
        let rows = vec![vec!["two\nlines".to_string()]];
        assert!(render_table(&headers, &rows).contains("two lines"));
    }
}
