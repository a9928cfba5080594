//! Structured extraction from assessor pages.
//!
//! Every parser takes raw markup and never fails: missing tables, odd
//! layouts and truncated documents yield partial or empty results.

pub mod columns;
pub mod detail;
pub mod html;
pub mod permits;
pub mod sales;
pub mod values;

pub use detail::{parse_detail, DetailFacts};
pub use permits::parse_permits;
pub use sales::parse_sales;

use crate::model::{ImprovementRecord, PermitRecord, SaleRecord};
use chrono::NaiveDate;

/// Everything extracted for one account across its three pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedAccount {
    pub sales: Vec<SaleRecord>,
    pub permits: Vec<PermitRecord>,
    pub improvements: Vec<ImprovementRecord>,
    pub sqft_living: Option<u32>,
    pub sqft_lot: Option<u64>,
    pub year_built: Option<i32>,
    pub assessed_value: Option<u64>,
    /// Last sale as reported on the detail page.
    pub last_sale_price: Option<u64>,
    pub last_sale_date: Option<NaiveDate>,
}

/// Parse whichever of the three pages are available.
pub fn parse_account(
    sales_html: Option<&str>,
    detail_html: Option<&str>,
    permit_html: Option<&str>,
) -> ParsedAccount {
    let mut parsed = ParsedAccount {
        sales: sales_html.map(parse_sales).unwrap_or_default(),
        permits: permit_html.map(parse_permits).unwrap_or_default(),
        ..Default::default()
    };

    if let Some(html) = detail_html {
        let facts = parse_detail(html);
        parsed.improvements = facts.improvements;
        parsed.sqft_living = facts.sqft_living;
        parsed.sqft_lot = facts.sqft_lot;
        parsed.year_built = facts.year_built;
        parsed.assessed_value = facts.assessed_value;
        parsed.last_sale_price = facts.last_sale_price;
        parsed.last_sale_date = facts.last_sale_date;
    }

    parsed
}
