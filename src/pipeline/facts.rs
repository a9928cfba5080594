//! Folding extracted facts into parcel records.

use crate::extraction::ParsedAccount;
use crate::model::ParcelRecord;
use serde::Serialize;
use std::ops::AddAssign;

/// Fields that went from unknown to known during an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactsDelta {
    pub sale: usize,
    pub sqft_living: usize,
    pub sqft_lot: usize,
    pub year_built: usize,
    pub assessed_value: usize,
}

impl AddAssign for FactsDelta {
    fn add_assign(&mut self, other: Self) {
        self.sale += other.sale;
        self.sqft_living += other.sqft_living;
        self.sqft_lot += other.sqft_lot;
        self.year_built += other.year_built;
        self.assessed_value += other.assessed_value;
    }
}

fn overwrite<T: Copy>(slot: &mut Option<T>, value: Option<T>) -> usize {
    let Some(value) = value else {
        return 0;
    };
    let newly = usize::from(slot.is_none());
    *slot = Some(value);
    newly
}

/// Apply one account's parsed pages to its parcel.
///
/// Populated values overwrite, absent ones never clear. The last sale is
/// the newest priced row of the sales history, falling back to the
/// detail page's own last-sale block. Sale and permit counts always
/// reflect the parsed lists. Price ratios are derived from these fields
/// and need no separate update.
pub fn apply_parsed(parcel: &mut ParcelRecord, parsed: &ParsedAccount) -> FactsDelta {
    let mut delta = FactsDelta {
        sqft_living: overwrite(&mut parcel.sqft_living, parsed.sqft_living),
        sqft_lot: overwrite(&mut parcel.sqft_lot, parsed.sqft_lot),
        year_built: overwrite(&mut parcel.year_built, parsed.year_built),
        assessed_value: overwrite(&mut parcel.assessed_value, parsed.assessed_value),
        ..Default::default()
    };

    let history_sale = parsed
        .sales
        .iter()
        .find(|s| s.price.is_some_and(|p| p > 0))
        .map(|s| (s.price, s.date));
    let page_sale = parsed
        .last_sale_price
        .filter(|p| *p > 0)
        .map(|p| (Some(p), parsed.last_sale_date));

    if let Some((price, date)) = history_sale.or(page_sale) {
        delta.sale = usize::from(parcel.last_sale_price.is_none());
        parcel.last_sale_price = price;
        parcel.last_sale_date = date;
    }

    parcel.num_sales = Some(parsed.sales.len() as u32);
    parcel.num_permits = Some(parsed.permits.len() as u32);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::parse_account;
    use crate::model::SaleRecord;
    use chrono::NaiveDate;

    #[test]
    fn test_detail_page_only_parcel() {
        let detail = r#"
<table>
  <tr><td class="asmt_hd">Last Sale</td></tr>
  <tr><td class="asmt_info">$450,000</td><td class="asmt_info">06/01/2021</td></tr>
</table>
<table>
  <tr><td>Living Area</td><td>1,500</td></tr>
  <tr><td>Year Built</td><td>1995</td></tr>
</table>"#;
        let parsed = parse_account(None, Some(detail), None);
        let mut parcel = ParcelRecord::seeded("", "391E04DB01400", "", None);

        let delta = apply_parsed(&mut parcel, &parsed);
        assert_eq!(parcel.sqft_living, Some(1500));
        assert_eq!(parcel.year_built, Some(1995));
        assert_eq!(parcel.last_sale_price, Some(450_000));
        assert_eq!(parcel.last_sale_date, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert_eq!(parcel.price_per_sqft(), Some(300.0));
        assert_eq!(parcel.num_sales, Some(parsed.sales.len() as u32));
        assert_eq!(parcel.num_permits, Some(0));
        assert_eq!(delta.sale, 1);
        assert_eq!(delta.sqft_living, 1);
    }

    #[test]
    fn test_history_sale_preferred_and_nothing_cleared() {
        let mut parcel = ParcelRecord::seeded("1", "", "", None);
        parcel.sqft_living = Some(2000);
        parcel.assessed_value = Some(300_000);

        let parsed = ParsedAccount {
            sales: vec![
                SaleRecord {
                    date: NaiveDate::from_ymd_opt(2023, 1, 1),
                    price: None,
                    ..Default::default()
                },
                SaleRecord {
                    date: NaiveDate::from_ymd_opt(2022, 5, 5),
                    price: Some(500_000),
                    ..Default::default()
                },
            ],
            last_sale_price: Some(410_000),
            last_sale_date: NaiveDate::from_ymd_opt(2019, 1, 1),
            ..Default::default()
        };

        let delta = apply_parsed(&mut parcel, &parsed);
        assert_eq!(parcel.last_sale_price, Some(500_000));
        assert_eq!(parcel.last_sale_date, NaiveDate::from_ymd_opt(2022, 5, 5));
        assert_eq!(parcel.sqft_living, Some(2000));
        assert_eq!(parcel.assessed_value, Some(300_000));
        assert_eq!(parcel.price_per_sqft(), Some(250.0));
        assert_eq!(parcel.num_sales, Some(2));
        assert_eq!(delta, FactsDelta { sale: 1, ..Default::default() });
    }

    #[test]
    fn test_overwrite_existing_is_not_new() {
        let mut parcel = ParcelRecord::seeded("1", "", "", None);
        parcel.year_built = Some(1950);
        let parsed = ParsedAccount {
            year_built: Some(1951),
            ..Default::default()
        };
        let delta = apply_parsed(&mut parcel, &parsed);
        assert_eq!(parcel.year_built, Some(1951));
        assert_eq!(delta.year_built, 0);
    }
}
