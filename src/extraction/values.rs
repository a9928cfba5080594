//! Scalar parsing for values scraped out of table cells.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Exact formats tried in order before the loose fallback.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%m/%d/%y",
    "%b %d, %Y",
    "%B %d, %Y",
];

fn loose_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})").expect("valid regex"))
}

/// Collapse runs of whitespace and trim.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a date written in any of the formats the county site uses.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            // chrono accepts "21" for %Y; only %y may produce a short year.
            if fmt.contains("%Y") && !has_four_digit_year(text, date.year()) {
                continue;
            }
            return Some(date);
        }
    }

    if let Some(caps) = loose_date_re().captures(text) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        let raw_year = &caps[3];
        let mut year: i32 = raw_year.parse().ok()?;
        if raw_year.len() == 2 {
            year += if year < 50 { 2000 } else { 1900 };
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    debug!("could not parse date: {text:?}");
    None
}

fn has_four_digit_year(text: &str, year: i32) -> bool {
    year >= 1000 && text.contains(&year.to_string())
}

/// Parse `$425,000` or `425000.00` into whole dollars.
pub fn parse_price(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.trunc() as u64)
}

/// Parse an integer, ignoring every non-digit character.
pub fn parse_int(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a decimal, rounded to two places.
pub fn parse_float(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value: f64 = cleaned.parse().ok()?;
    Some((value * 100.0).round() / 100.0)
}

/// Year built must be plausible.
pub fn valid_year(year: u64) -> Option<i32> {
    (1800..=2030).contains(&year).then_some(year as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_exact_formats() {
        assert_eq!(parse_date("06/01/2021"), ymd(2021, 6, 1));
        assert_eq!(parse_date("6/1/2021"), ymd(2021, 6, 1));
        assert_eq!(parse_date("06-01-2021"), ymd(2021, 6, 1));
        assert_eq!(parse_date("2021-06-01"), ymd(2021, 6, 1));
        assert_eq!(parse_date("Jun 01, 2021"), ymd(2021, 6, 1));
        assert_eq!(parse_date("June 1, 2021"), ymd(2021, 6, 1));
    }

    #[test]
    fn test_two_digit_year_exact_format() {
        // %m/%d/%Y must not swallow "21" as year 21.
        assert_eq!(parse_date("06/01/21"), ymd(2021, 6, 1));
    }

    #[test]
    fn test_loose_fallback() {
        assert_eq!(parse_date("Recorded 3/15/1998 by clerk"), ymd(1998, 3, 15));
        assert_eq!(parse_date("Deed 3-15-49 (orig)"), ymd(2049, 3, 15));
        assert_eq!(parse_date("Deed 3-15-50 (orig)"), ymd(1950, 3, 15));
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("n/a"), None);
        assert_eq!(parse_date("13/45/2020"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("$425,000"), Some(425_000));
        assert_eq!(parse_price("425000.75"), Some(425_000));
        assert_eq!(parse_price("$0"), Some(0));
        assert_eq!(parse_price("none"), None);
        assert_eq!(parse_price("1.2.3"), None);
    }

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!(parse_int("1,540 sqft"), Some(1540));
        assert_eq!(parse_int("--"), None);
        assert_eq!(parse_float("0.17 ac"), Some(0.17));
        assert_eq!(parse_float("1.005"), Some(1.0));
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Sale \n\t Date "), "Sale Date");
    }

    #[test]
    fn test_valid_year() {
        assert_eq!(valid_year(1995), Some(1995));
        assert_eq!(valid_year(1799), None);
        assert_eq!(valid_year(2031), None);
    }
}
