//! Header label matching for spreadsheet exports.
//!
//! Exports of the same roster rarely agree on header spelling: `Payroll Number`,
//! `payroll_number` and ` PAYROLL  NUMBER` all name the same column. Labels are
//! folded (BOM removed, trimmed, underscores treated as spaces, whitespace
//! collapsed, lower-cased) before comparison.

use std::collections::HashMap;

pub fn fold_header(label: &str) -> String {
    label
        .trim_matches(|c: char| c == '\u{feff}' || c.is_whitespace())
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct HeaderIndex {
    headers: Vec<String>,
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let folded = fold_header(header);
            if folded.is_empty() {
                continue;
            }
            // First occurrence wins when an export repeats a label.
            positions.entry(folded).or_insert(idx);
        }
        Self {
            headers: headers.to_vec(),
            positions,
        }
    }

    /// Position of the first alias present in the header row.
    pub fn find(&self, aliases: &[String]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.positions.get(&fold_header(alias)).copied())
    }

    pub fn label(&self, position: usize) -> Option<&str> {
        self.headers.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn aliases(labels: &[&str]) -> Vec<String> {
        headers(labels)
    }

    #[test]
    fn fold_header_normalizes_spacing_case_and_bom() {
        assert_eq!(fold_header("\u{feff}Payroll Number"), "payroll number");
        assert_eq!(fold_header("  payroll_number "), "payroll number");
        assert_eq!(fold_header("PAYROLL   NUMBER"), "payroll number");
        assert_eq!(fold_header("   "), "");
    }

    #[test]
    fn find_uses_first_matching_alias() {
        let index = HeaderIndex::new(&headers(&["Surname", "First Name", "Last Name"]));
        assert_eq!(index.find(&aliases(&["last_name", "surname"])), Some(2));
        assert_eq!(index.find(&aliases(&["surname", "last_name"])), Some(0));
        assert_eq!(index.find(&aliases(&["middle name"])), None);
    }

    #[test]
    fn repeated_labels_resolve_to_first_column() {
        let index = HeaderIndex::new(&headers(&["Name", "name", "Other"]));
        assert_eq!(index.find(&aliases(&["NAME"])), Some(0));
        assert_eq!(index.label(1), Some("name"));
        assert_eq!(index.len(), 3);
    }
}
