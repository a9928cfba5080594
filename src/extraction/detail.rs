//! Property-detail extraction (`Ora_asmt_details.cfm`).
//!
//! Each pass only fills fields that are still empty, so the first pass to
//! produce a valid value for a field wins:
//!
//! 1. labelled key/value pairs matched against a synonym table
//! 2. the assessor's own layout (last-sale block, market value total, acreage)
//! 3. the improvements table
//! 4. regular expressions over the visible page text

use super::columns::{headers_contain_all, ColumnMap, FieldKeywords};
use super::html::{
    child_elements, contains_table, has_class, next_element_sibling, row_cells, row_texts,
    table_rows, tables, text_of, visible_text,
};
use super::values::{clean_text, parse_date, parse_float, parse_int, parse_price, valid_year};
use crate::model::ImprovementRecord;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use tracing::debug;

const SQFT_PER_ACRE: f64 = 43_560.0;

/// Summary facts recovered from one detail page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFacts {
    pub sqft_living: Option<u32>,
    pub sqft_lot: Option<u64>,
    pub year_built: Option<i32>,
    pub assessed_value: Option<u64>,
    pub last_sale_price: Option<u64>,
    pub last_sale_date: Option<NaiveDate>,
    pub improvements: Vec<ImprovementRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DetailField {
    LivingArea,
    LotArea,
    YearBuilt,
    AssessedValue,
    LastSalePrice,
    LastSaleDate,
}

const FIELD_SYNONYMS: &[FieldKeywords<DetailField>] = &[
    (
        DetailField::LivingArea,
        &["living area", "total living", "bldg sqft", "building sqft", "living sqft", "finished area"],
    ),
    (DetailField::LotArea, &["lot size", "lot sqft", "lot area", "land sqft", "land area"]),
    (DetailField::YearBuilt, &["year built", "yr built", "yearbuilt"]),
    (
        DetailField::AssessedValue,
        &["assessed value", "total assessed", "assessed total", "real market value"],
    ),
    (DetailField::LastSalePrice, &["last sale price", "sale price", "sold price"]),
    (DetailField::LastSaleDate, &["last sale date", "sale date", "sold date"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ImprovementField {
    Building,
    StructureType,
    Area,
    YearBuilt,
    Condition,
    Description,
    StatClass,
}

const IMPROVEMENT_COLUMNS: &[FieldKeywords<ImprovementField>] = &[
    (ImprovementField::Building, &["building", "bldg"]),
    (ImprovementField::StructureType, &["type", "structure", "occupancy"]),
    (ImprovementField::Area, &["sqft", "sq ft", "square feet"]),
    (ImprovementField::YearBuilt, &["year built", "yr built"]),
    (ImprovementField::Condition, &["condition", "cond"]),
    (ImprovementField::Description, &["description", "desc"]),
    (ImprovementField::StatClass, &["stat class", "class"]),
];

const IMPROVEMENT_HEADER: &[&[&str]] = &[&["building", "bldg"], &["sqft", "sq ft", "square feet"]];

/// Longest text still treated as a field label in sibling pairs.
const MAX_LABEL_LEN: usize = 40;

const LABEL_TAGS: &[&str] = &["th", "td", "span", "label", "b", "strong", "div", "p"];

fn living_area_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:living\s*area|total\s*living|bldg\.?\s*sq\.?\s*ft|living\s*sq\.?\s*ft)\D{0,20}?(\d[\d,]{2,8})")
            .expect("valid regex")
    })
}

fn year_built_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:year|yr)\.?\s*built\D{0,10}?(\d{4})").expect("valid regex")
    })
}

fn assessed_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:total\s*assessed|assessed\s*value|real\s*market\s*value)\D{0,20}?(\d[\d,]{2,14})")
            .expect("valid regex")
    })
}

/// Parse a property-detail page.
pub fn parse_detail(html: &str) -> DetailFacts {
    let doc = Html::parse_document(html);
    let mut facts = DetailFacts::default();

    for (label, value) in labelled_pairs(&doc) {
        facts.absorb_pair(&label, &value);
    }

    last_sale_block(&doc, &mut facts);
    market_value_total(&doc, &mut facts);
    acreage(&doc, &mut facts);

    facts.improvements = improvements_table(&doc);
    facts.fill_from_improvements();

    facts.fill_from_text(&visible_text(&doc));

    debug!(
        "detail: living={:?} lot={:?} year={:?} assessed={:?} last_sale={:?} improvements={}",
        facts.sqft_living,
        facts.sqft_lot,
        facts.year_built,
        facts.assessed_value,
        facts.last_sale_price,
        facts.improvements.len()
    );
    facts
}

impl DetailFacts {
    fn absorb_pair(&mut self, label: &str, value: &str) {
        let label = label.to_lowercase();
        let label = label.trim_end_matches(':').trim();
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return;
        }

        for (field, synonyms) in FIELD_SYNONYMS {
            if !synonyms.iter().any(|s| label.contains(s)) {
                continue;
            }
            match field {
                DetailField::LivingArea if self.sqft_living.is_none() => {
                    self.sqft_living = positive_area(value);
                }
                DetailField::LotArea if self.sqft_lot.is_none() => {
                    self.sqft_lot = parse_int(value).filter(|v| *v > 0);
                }
                DetailField::YearBuilt if self.year_built.is_none() => {
                    self.year_built = parse_int(value).and_then(valid_year);
                }
                DetailField::AssessedValue if self.assessed_value.is_none() => {
                    self.assessed_value = parse_price(value).filter(|v| *v > 0);
                }
                DetailField::LastSalePrice if self.last_sale_price.is_none() => {
                    self.last_sale_price = parse_price(value).filter(|v| *v > 0);
                }
                DetailField::LastSaleDate if self.last_sale_date.is_none() => {
                    self.last_sale_date = parse_date(value);
                }
                _ => {}
            }
            return;
        }
    }

    /// The first dwelling is authoritative; otherwise any improvement with
    /// an area, then any with a year.
    fn fill_from_improvements(&mut self) {
        if let Some(dwelling) = self.improvements.iter().find(|i| i.is_dwelling()) {
            if self.year_built.is_none() {
                self.year_built = dwelling.year_built;
            }
            if self.sqft_living.is_none() {
                self.sqft_living = dwelling.sqft;
            }
        }
        if self.sqft_living.is_none() {
            self.sqft_living = self.improvements.iter().find_map(|i| i.sqft);
        }
        if self.year_built.is_none() {
            self.year_built = self.improvements.iter().find_map(|i| i.year_built);
        }
    }

    fn fill_from_text(&mut self, text: &str) {
        if self.sqft_living.is_none() {
            self.sqft_living = first_capture(living_area_re(), text).and_then(|v| positive_area(&v));
        }
        if self.year_built.is_none() {
            self.year_built = first_capture(year_built_re(), text)
                .and_then(|v| parse_int(&v))
                .and_then(valid_year);
        }
        if self.assessed_value.is_none() {
            self.assessed_value = first_capture(assessed_value_re(), text)
                .and_then(|v| parse_price(&v))
                .filter(|v| *v > 0);
        }
    }
}

fn positive_area(text: &str) -> Option<u32> {
    parse_int(text)
        .filter(|v| *v > 0)
        .and_then(|v| u32::try_from(v).ok())
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Label/value candidates in document order: two-cell table rows, then
/// definition lists, then short leaf elements followed by a sibling.
fn labelled_pairs(doc: &Html) -> Vec<(String, String)> {
    let mut pairs = Vec::new();

    for table in tables(doc) {
        for row in table_rows(table) {
            if contains_table(row) {
                continue;
            }
            let cells = row_texts(row, true);
            if let [label, value] = cells.as_slice() {
                pairs.push((label.clone(), value.clone()));
            }
        }
    }

    if let Ok(sel) = Selector::parse("dl") {
        for dl in doc.select(&sel) {
            let mut term: Option<String> = None;
            for child in child_elements(dl) {
                match child.value().name() {
                    "dt" => term = Some(text_of(child)),
                    "dd" => {
                        if let Some(label) = term.take() {
                            pairs.push((label, text_of(child)));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    for el in doc.root_element().descendants().filter_map(ElementRef::wrap) {
        if !LABEL_TAGS.contains(&el.value().name()) || child_elements(el).next().is_some() {
            continue;
        }
        let label = text_of(el);
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            continue;
        }
        if let Some(value) = next_element_sibling(el) {
            if !contains_table(value) {
                pairs.push((label, text_of(value)));
            }
        }
    }

    pairs
}

fn asmt_header_cells<'a>(doc: &'a Html, tag: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(&format!("{tag}.asmt_hd")) {
        Ok(sel) => doc.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// "Last Sale" header row; the following row holds `[price, date]`.
fn last_sale_block(doc: &Html, facts: &mut DetailFacts) {
    if facts.last_sale_price.is_some() {
        return;
    }
    let Some(header) = asmt_header_cells(doc, "td")
        .into_iter()
        .find(|td| text_of(*td).to_lowercase().contains("last sale"))
    else {
        return;
    };
    let Some(data_row) = parent_element(header).and_then(next_element_sibling) else {
        return;
    };

    let values: Vec<String> = row_cells(data_row, false)
        .into_iter()
        .filter(|c| has_class(*c, "asmt_info"))
        .map(text_of)
        .collect();
    if let [price, date, ..] = values.as_slice() {
        if let Some(price) = parse_price(price).filter(|p| *p > 0) {
            facts.last_sale_price = Some(price);
            if facts.last_sale_date.is_none() {
                facts.last_sale_date = parse_date(date);
            }
        }
    }
}

/// Largest figure on the market value summary's "Total" row.
fn market_value_total(doc: &Html, facts: &mut DetailFacts) {
    if facts.assessed_value.is_some() {
        return;
    }
    let Some(table) = market_table(doc) else {
        return;
    };
    let Ok(tr) = Selector::parse("tr") else {
        return;
    };

    for row in table.select(&tr) {
        let cells = row_texts(row, false);
        if !cells.iter().any(|c| c.to_lowercase().contains("total")) {
            continue;
        }
        facts.assessed_value = cells.iter().filter_map(|c| parse_price(c)).max().filter(|v| *v > 0);
        return;
    }
}

fn market_table(doc: &Html) -> Option<ElementRef<'_>> {
    if let Ok(sel) = Selector::parse("table#MarketTable") {
        if let Some(table) = doc.select(&sel).next() {
            return Some(table);
        }
    }

    let header = asmt_header_cells(doc, "th")
        .into_iter()
        .find(|th| text_of(*th).to_lowercase().contains("market value summary"))?;
    let next_row = parent_element(header).and_then(next_element_sibling)?;
    next_row
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table")
}

/// Land acreage converted to square feet.
fn acreage(doc: &Html, facts: &mut DetailFacts) {
    if facts.sqft_lot.is_some() {
        return;
    }
    let Some(header) = asmt_header_cells(doc, "td")
        .into_iter()
        .find(|td| text_of(*td).eq_ignore_ascii_case("acreage"))
    else {
        return;
    };
    let value = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td" && has_class(*el, "asmt_info"));
    if let Some(acres) = value.and_then(|v| parse_float(&text_of(v))) {
        if acres > 0.0 {
            facts.sqft_lot = Some((acres * SQFT_PER_ACRE).round() as u64);
        }
    }
}

/// The first table with a building/area header row; rows run until the
/// next header row.
fn improvements_table(doc: &Html) -> Vec<ImprovementRecord> {
    for table in tables(doc) {
        let rows = table_rows(table);
        let header_idx = rows.iter().position(|row| {
            if contains_table(*row) {
                return false;
            }
            let headers = row_texts(*row, true);
            headers.len() >= 3 && headers_contain_all(&headers, IMPROVEMENT_HEADER)
        });
        let Some(header_idx) = header_idx else {
            continue;
        };

        let map = ColumnMap::build(&row_texts(rows[header_idx], true), IMPROVEMENT_COLUMNS);
        let mut improvements = Vec::new();
        for row in &rows[header_idx + 1..] {
            if row_cells(*row, true).iter().any(|c| c.value().name() == "th") {
                break;
            }
            let cells = row_texts(*row, false);
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            if let Some(imp) = improvement_from_row(&map, &cells) {
                improvements.push(imp);
            }
        }
        return improvements;
    }
    Vec::new()
}

fn improvement_from_row(
    map: &ColumnMap<ImprovementField>,
    cells: &[String],
) -> Option<ImprovementRecord> {
    let text = |field| {
        map.cell(field, cells)
            .map(clean_text)
            .filter(|s| !s.is_empty())
    };

    let structure_type = text(ImprovementField::StructureType)?;
    Some(ImprovementRecord {
        building: text(ImprovementField::Building),
        structure_type: Some(structure_type),
        sqft: map.cell(ImprovementField::Area, cells).and_then(positive_area),
        year_built: map
            .cell(ImprovementField::YearBuilt, cells)
            .and_then(parse_int)
            .and_then(valid_year),
        condition: text(ImprovementField::Condition),
        description: text(ImprovementField::Description),
        stat_class: text(ImprovementField::StatClass),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTY_PAGE: &str = r#"
<html><body>
<table>
  <tr><td class="asmt_hd">Account</td><td class="asmt_info">10012345</td></tr>
</table>
<table>
  <tr><td class="asmt_hd">Last Sale</td><td class="asmt_hd">Date</td></tr>
  <tr><td class="asmt_info">$450,000</td><td class="asmt_info">06/01/2021</td></tr>
</table>
<table>
  <tr><td class="asmt_hd">Acreage</td><td class="asmt_info">0.17</td>
      <td class="asmt_hd">Tax Code</td><td class="asmt_info">49-01</td></tr>
</table>
<table>
  <tr><th class="asmt_hd">Market Value Summary</th></tr>
  <tr><td>
    <table id="MarketTable">
      <tr><td>PSO</td><td>Land</td><td>$120,000</td><td>$0</td><td>$98,000</td><td>$98,000</td></tr>
      <tr><td>PSO</td><td>Total:</td><td>$389,000</td><td>$0</td><td>$245,310</td><td>$245,310</td></tr>
    </table>
  </td></tr>
</table>
<table>
  <tr><th class="asmt_hd">Improvements</th></tr>
  <tr><td class="asmt_hd">Building #</td><td class="asmt_hd">Code Area</td>
      <td class="asmt_hd">Year Built</td><td class="asmt_hd">Eff Year</td>
      <td class="asmt_hd">Stat Class</td><td class="asmt_hd">Description</td>
      <td class="asmt_hd">Type</td><td class="asmt_hd">SqFt</td></tr>
  <tr><td class="asmt_info">2</td><td class="asmt_info">49-01</td>
      <td class="asmt_info">1996</td><td class="asmt_info">1996</td>
      <td class="asmt_info">300</td><td class="asmt_info">Detached garage</td>
      <td class="asmt_info">GARAGE</td><td class="asmt_info">480</td></tr>
  <tr><td class="asmt_info">1</td><td class="asmt_info">49-01</td>
      <td class="asmt_info">1995</td><td class="asmt_info">2001</td>
      <td class="asmt_info">142</td><td class="asmt_info">Single family</td>
      <td class="asmt_info">RESIDENCE</td><td class="asmt_info">1,500</td></tr>
  <tr><td class="asmt_info"></td><td class="asmt_info">49-01</td>
      <td class="asmt_info"></td><td class="asmt_info"></td>
      <td class="asmt_info"></td><td class="asmt_info">Paving</td>
      <td class="asmt_info"></td><td class="asmt_info">900</td></tr>
  <tr><th>Land</th></tr>
  <tr><td class="asmt_info">9</td><td></td><td>1900</td><td></td><td></td><td></td>
      <td class="asmt_info">SHED</td><td>60</td></tr>
</table>
</body></html>"#;

    #[test]
    fn test_county_layout() {
        let facts = parse_detail(COUNTY_PAGE);
        assert_eq!(facts.last_sale_price, Some(450_000));
        assert_eq!(facts.last_sale_date, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert_eq!(facts.sqft_lot, Some(7405));
        assert_eq!(facts.assessed_value, Some(389_000));
    }

    #[test]
    fn test_improvements_table() {
        let facts = parse_detail(COUNTY_PAGE);
        // Paving row names no type; the shed sits past the next header row.
        assert_eq!(facts.improvements.len(), 2);

        let garage = &facts.improvements[0];
        assert_eq!(garage.structure_type.as_deref(), Some("GARAGE"));
        assert_eq!(garage.building.as_deref(), Some("2"));
        assert_eq!(garage.sqft, Some(480));
        assert_eq!(garage.stat_class.as_deref(), Some("300"));
        assert_eq!(garage.description.as_deref(), Some("Detached garage"));

        // The dwelling wins over the earlier garage.
        assert_eq!(facts.sqft_living, Some(1500));
        assert_eq!(facts.year_built, Some(1995));
    }

    #[test]
    fn test_key_value_pairs_take_precedence() {
        let html = r#"
<table>
  <tr><td>Total Living Area:</td><td>2,100 sq ft</td></tr>
  <tr><td>Year Built</td><td>1650</td></tr>
</table>
<dl><dt>Yr Built</dt><dd>1978</dd><dt>Assessed Value</dt><dd>$312,400</dd></dl>
<div><span>Lot Size:</span><span>6,534</span></div>
<div><span>Sale Price</span><span>$0</span></div>"#;
        let facts = parse_detail(html);
        assert_eq!(facts.sqft_living, Some(2100));
        // 1650 fails range validation, so the dl value is used.
        assert_eq!(facts.year_built, Some(1978));
        assert_eq!(facts.assessed_value, Some(312_400));
        assert_eq!(facts.sqft_lot, Some(6534));
        assert_eq!(facts.last_sale_price, None);
    }

    #[test]
    fn test_text_fallback() {
        let html = "<html><body><p>This home has a living area of 1,820 sq ft and was \
                    built in a quiet street. Year built: 1962. Total assessed $201,550.</p>\
                    <script>var living_area = 99999;</script></body></html>";
        let facts = parse_detail(html);
        assert_eq!(facts.sqft_living, Some(1820));
        assert_eq!(facts.year_built, Some(1962));
        assert_eq!(facts.assessed_value, Some(201_550));
    }

    #[test]
    fn test_empty_and_garbage() {
        assert_eq!(parse_detail(""), DetailFacts::default());
        assert_eq!(parse_detail("<<<not html"), DetailFacts::default());
    }

    #[test]
    fn test_improvement_fallbacks_without_dwelling() {
        let html = r#"
<table>
  <tr><th>Bldg</th><th>Type</th><th>Year Built</th><th>Sq Ft</th><th>Condition</th></tr>
  <tr><td>1</td><td>SHOP</td><td></td><td>0</td><td>Fair</td></tr>
  <tr><td>2</td><td>BARN</td><td>1940</td><td>2,400</td><td>Poor</td></tr>
</table>"#;
        let facts = parse_detail(html);
        assert_eq!(facts.improvements.len(), 2);
        assert_eq!(facts.improvements[0].sqft, None);
        assert_eq!(facts.improvements[0].condition.as_deref(), Some("Fair"));
        assert_eq!(facts.sqft_living, Some(2400));
        assert_eq!(facts.year_built, Some(1940));
    }
}
