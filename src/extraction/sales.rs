//! Sales-history extraction.
//!
//! The sales page carries up to two transfer tables: the ORCATS table
//! (book-page, sale date, price, grantee, grantor, document type) and an
//! older journal-voucher table. Tables are recognized by header keywords,
//! in a fixed order, and the journal-voucher rows are only used when the
//! ORCATS table produced nothing.

use super::columns::{headers_contain_all, ColumnMap, FieldKeywords};
use super::html::{row_texts, table_rows, tables};
use super::values::{parse_date, parse_price};
use crate::model::SaleRecord;
use scraper::Html;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SaleField {
    BookPage,
    Date,
    JvDate,
    Price,
    Buyer,
    Seller,
    DocType,
}

/// Which bucket a recognized table's rows go into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableRole {
    Primary,
    Fallback,
}

/// A recognizable transfer-table layout.
struct TableShape {
    name: &'static str,
    role: TableRole,
    /// Every group must be matched by some header cell.
    header_groups: &'static [&'static [&'static str]],
    columns: &'static [FieldKeywords<SaleField>],
}

const ORCATS_COLUMNS: &[FieldKeywords<SaleField>] = &[
    (SaleField::BookPage, &["book - page", "book-page", "book page"]),
    (SaleField::Date, &["sale date"]),
    (SaleField::Price, &["sale price"]),
    (SaleField::Buyer, &["grantee"]),
    (SaleField::Seller, &["grantor"]),
    (SaleField::DocType, &["document type"]),
];

const JV_COLUMNS: &[FieldKeywords<SaleField>] = &[
    (SaleField::JvDate, &["journal voucher date", "sale date"]),
    (SaleField::Date, &["sale date"]),
    (SaleField::Price, &["sale $", "sale"]),
    (SaleField::Buyer, &["fee owner"]),
    (SaleField::DocType, &["instrument type"]),
];

/// Evaluated in order; the first shape whose header test passes claims the row.
const TABLE_SHAPES: &[TableShape] = &[
    TableShape {
        name: "orcats",
        role: TableRole::Primary,
        header_groups: &[&["sale date"], &["sale price", "price"], &["grantee"]],
        columns: ORCATS_COLUMNS,
    },
    TableShape {
        name: "journal-voucher",
        role: TableRole::Fallback,
        header_groups: &[&["journal voucher"], &["instrument"], &["fee owner", "sale"]],
        columns: JV_COLUMNS,
    },
];

/// Parse every sale row out of a sales-history page.
///
/// Rows are deduplicated by `(date, price)` and returned newest first;
/// undated rows sort last.
pub fn parse_sales(html: &str) -> Vec<SaleRecord> {
    let doc = Html::parse_document(html);
    let mut primary = Vec::new();
    let mut fallback = Vec::new();

    for table in tables(&doc) {
        let rows = table_rows(table);
        if rows.len() < 2 {
            continue;
        }

        for (idx, row) in rows.iter().enumerate() {
            let headers = row_texts(*row, true);
            let Some(shape) = TABLE_SHAPES
                .iter()
                .find(|s| headers_contain_all(&headers, s.header_groups))
            else {
                continue;
            };

            let map = ColumnMap::build(&headers, shape.columns);
            let mut found = 0;
            for data_row in &rows[idx + 1..] {
                let cells = row_texts(*data_row, false);
                if cells.len() < 3 || cells.iter().all(|c| c.is_empty()) {
                    continue;
                }
                let Some(sale) = sale_from_row(&map, &cells) else {
                    continue;
                };
                found += 1;
                match shape.role {
                    TableRole::Primary => primary.push(sale),
                    TableRole::Fallback => fallback.push(sale),
                }
            }
            debug!("{} table: {found} sale rows", shape.name);
        }
    }

    let sales = if primary.is_empty() { fallback } else { primary };
    dedup_and_sort(sales)
}

fn sale_from_row(map: &ColumnMap<SaleField>, cells: &[String]) -> Option<SaleRecord> {
    let owned = |field| map.cell(field, cells).map(str::to_string);

    // Journal vouchers carry both a voucher date and a sale date; prefer the sale.
    let date = match map.cell(SaleField::Date, cells) {
        Some(text) => parse_date(text),
        None => map.cell(SaleField::JvDate, cells).and_then(parse_date),
    };

    let sale = SaleRecord {
        date,
        price: map.cell(SaleField::Price, cells).and_then(parse_price),
        buyer: owned(SaleField::Buyer),
        seller: owned(SaleField::Seller),
        deed_type: owned(SaleField::DocType),
        book_page: owned(SaleField::BookPage),
    };

    sale.is_meaningful().then_some(sale)
}

fn dedup_and_sort(sales: Vec<SaleRecord>) -> Vec<SaleRecord> {
    let mut seen = HashSet::new();
    let mut unique: Vec<SaleRecord> = sales
        .into_iter()
        .filter(|s| seen.insert((s.date, s.price)))
        .collect();
    unique.sort_by(|a, b| b.date.cmp(&a.date));
    unique
}
