//! Header-text → column-index mapping shared by every table extractor.

use std::collections::HashMap;
use std::hash::Hash;

/// A logical field and the header substrings that identify its column.
pub type FieldKeywords<F> = (F, &'static [&'static str]);

/// Resolved column index per logical field.
#[derive(Debug, Clone)]
pub struct ColumnMap<F: Eq + Hash> {
    columns: HashMap<F, usize>,
}

impl<F: Eq + Hash + Copy> ColumnMap<F> {
    /// For each field, take the first header (left to right) containing any
    /// of its keywords, case-insensitively. First match wins, not best
    /// match: a generic keyword can claim a column to the left of a more
    /// specific one.
    pub fn build(headers: &[String], fields: &[FieldKeywords<F>]) -> Self {
        let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        let mut columns = HashMap::new();

        for (field, keywords) in fields {
            let hit = lowered
                .iter()
                .position(|header| keywords.iter().any(|kw| header.contains(kw)));
            if let Some(idx) = hit {
                columns.insert(*field, idx);
            }
        }

        Self { columns }
    }

    pub fn index(&self, field: F) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// The cell text for `field` in a data row, if the row is wide enough.
    pub fn cell<'r>(&self, field: F, row: &'r [String]) -> Option<&'r str> {
        self.index(field)
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// True when every keyword group has at least one header containing one of
/// its keywords.
pub fn headers_contain_all(headers: &[String], groups: &[&[&str]]) -> bool {
    let lowered: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    groups
        .iter()
        .all(|group| lowered.iter().any(|h| group.iter().any(|kw| h.contains(kw))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum F {
        Number,
        Type,
        Description,
    }

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_first_column_wins() {
        let h = headers(&["Permit #", "Permit Type", "Description"]);
        let map = ColumnMap::build(
            &h,
            &[
                (F::Number, &["permit", "number"]),
                (F::Type, &["type", "description"]),
                (F::Description, &["description"]),
            ],
        );
        // "permit" matches column 0 first, even though column 1 also contains it.
        assert_eq!(map.index(F::Number), Some(0));
        assert_eq!(map.index(F::Type), Some(1));
        assert_eq!(map.index(F::Description), Some(2));
    }

    #[test]
    fn test_leftmost_match_not_best_match() {
        let h = headers(&["Sale Date", "Sale $"]);
        let map = ColumnMap::build(&h, &[(F::Number, &["sale $", "sale"])]);
        assert_eq!(map.index(F::Number), Some(0));
    }

    #[test]
    fn test_cell_lookup_bounds() {
        let h = headers(&["A", "Type"]);
        let map = ColumnMap::build(&h, &[(F::Type, &["type"])]);
        let short = headers(&["only"]);
        assert_eq!(map.cell(F::Type, &short), None);
        let full = headers(&["x", "RESIDENCE"]);
        assert_eq!(map.cell(F::Type, &full), Some("RESIDENCE"));
        assert_eq!(map.cell(F::Number, &full), None);
    }

    #[test]
    fn test_headers_contain_all() {
        let h = headers(&["Sale Date", "Sale Price", "Grantee"]);
        assert!(headers_contain_all(&h, &[&["sale date"], &["price"], &["grantee"]]));
        assert!(!headers_contain_all(&h, &[&["sale date"], &["grantor"]]));
    }
}
