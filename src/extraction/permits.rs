//! Permit-history extraction (`permit.cfm`).

use super::columns::{ColumnMap, FieldKeywords};
use super::html::{contains_table, row_texts, table_rows, tables};
use super::values::parse_date;
use crate::model::PermitRecord;
use scraper::Html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PermitField {
    Number,
    Type,
    Date,
    Status,
    Description,
}

const PERMIT_TABLE_KEYWORDS: &[&str] = &["permit", "application", "building"];

const PERMIT_COLUMNS: &[FieldKeywords<PermitField>] = &[
    (
        PermitField::Number,
        &["permit", "number", "permit no", "permit number", "application", "app"],
    ),
    (PermitField::Type, &["type", "permit type", "work type", "description"]),
    (PermitField::Date, &["date", "issue date", "issued", "applied", "app date"]),
    (PermitField::Status, &["status", "state", "disposition"]),
    (
        PermitField::Description,
        &["description", "desc", "work description", "scope"],
    ),
];

/// Parse every permit row out of a permit-history page, newest first.
pub fn parse_permits(html: &str) -> Vec<PermitRecord> {
    let doc = Html::parse_document(html);
    let mut permits = Vec::new();

    for table in tables(&doc) {
        let rows = table_rows(table);
        let Some((header_row, data_rows)) = rows.split_first() else {
            continue;
        };
        if data_rows.is_empty() || contains_table(*header_row) {
            continue;
        }

        let headers = row_texts(*header_row, true);
        if headers.len() < 2 {
            continue;
        }
        let joined = headers.join(" ").to_lowercase();
        if !PERMIT_TABLE_KEYWORDS.iter().any(|kw| joined.contains(kw)) {
            continue;
        }

        let map = ColumnMap::build(&headers, PERMIT_COLUMNS);
        for row in data_rows {
            let cells = row_texts(*row, false);
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            let text = |field| map.cell(field, &cells).map(str::to_string);
            let permit = PermitRecord {
                number: text(PermitField::Number),
                permit_type: text(PermitField::Type),
                date: map.cell(PermitField::Date, &cells).and_then(parse_date),
                status: text(PermitField::Status),
                description: text(PermitField::Description),
            };
            if permit.is_meaningful() {
                permits.push(permit);
            }
        }
    }

    permits.sort_by(|a, b| b.date.cmp(&a.date));
    permits
}
