//! The parcel record and the parcel index file.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One taxable property unit.
///
/// Price-per-area ratios are not fields: they are computed from the sale
/// price and areas on every read and written out alongside them, so a
/// change to either input can never leave a stale ratio behind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "ParcelRow", from = "ParcelRow")]
pub struct ParcelRecord {
    /// County account number; empty when no source supplied one.
    pub account: String,
    /// Map/taxlot code.
    pub maptaxlot: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub sqft_living: Option<u32>,
    pub sqft_lot: Option<u64>,
    pub year_built: Option<i32>,
    pub last_sale_price: Option<u64>,
    pub last_sale_date: Option<NaiveDate>,
    pub assessed_value: Option<u64>,
    pub num_sales: Option<u32>,
    pub num_permits: Option<u32>,
}

impl ParcelRecord {
    /// A seed record straight from a geometry source.
    pub fn seeded(
        account: impl Into<String>,
        maptaxlot: impl Into<String>,
        address: impl Into<String>,
        position: Option<(f64, f64)>,
    ) -> Self {
        Self {
            account: account.into(),
            maptaxlot: maptaxlot.into(),
            address: address.into(),
            lat: position.map(|(lat, _)| lat),
            lng: position.map(|(_, lng)| lng),
            ..Default::default()
        }
    }

    /// Account if known, otherwise the map/taxlot. Empty when neither is.
    pub fn identifier(&self) -> &str {
        if self.account.is_empty() {
            &self.maptaxlot
        } else {
            &self.account
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lng?))
    }

    /// Last sale price per square foot of living area.
    pub fn price_per_sqft(&self) -> Option<f64> {
        ratio(self.last_sale_price?, self.sqft_living? as u64)
    }

    /// Last sale price per square foot of lot.
    pub fn price_per_sqft_lot(&self) -> Option<f64> {
        ratio(self.last_sale_price?, self.sqft_lot?)
    }
}

fn ratio(price: u64, area: u64) -> Option<f64> {
    if price == 0 || area == 0 {
        return None;
    }
    Some(round2(price as f64 / area as f64))
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Wire shape of a parcel, including the derived ratios.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParcelRow {
    #[serde(default)]
    account: String,
    lat: Option<f64>,
    lng: Option<f64>,
    #[serde(default)]
    address: String,
    #[serde(default)]
    maptaxlot: String,
    #[serde(default)]
    sqft_living: Option<u32>,
    #[serde(default)]
    sqft_lot: Option<u64>,
    #[serde(default)]
    year_built: Option<i32>,
    #[serde(default)]
    last_sale_price: Option<u64>,
    #[serde(default)]
    last_sale_date: Option<NaiveDate>,
    #[serde(default)]
    price_per_sqft: Option<f64>,
    #[serde(default)]
    price_per_sqft_lot: Option<f64>,
    #[serde(default)]
    assessed_value: Option<u64>,
    #[serde(default)]
    num_sales: Option<u32>,
    #[serde(default)]
    num_permits: Option<u32>,
}

impl From<ParcelRecord> for ParcelRow {
    fn from(p: ParcelRecord) -> Self {
        Self {
            price_per_sqft: p.price_per_sqft(),
            price_per_sqft_lot: p.price_per_sqft_lot(),
            account: p.account,
            lat: p.lat,
            lng: p.lng,
            address: p.address,
            maptaxlot: p.maptaxlot,
            sqft_living: p.sqft_living,
            sqft_lot: p.sqft_lot,
            year_built: p.year_built,
            last_sale_price: p.last_sale_price,
            last_sale_date: p.last_sale_date,
            assessed_value: p.assessed_value,
            num_sales: p.num_sales,
            num_permits: p.num_permits,
        }
    }
}

impl From<ParcelRow> for ParcelRecord {
    // Stored ratios are dropped; they are recomputed from the inputs.
    fn from(r: ParcelRow) -> Self {
        Self {
            account: r.account,
            maptaxlot: r.maptaxlot,
            address: r.address,
            lat: r.lat,
            lng: r.lng,
            sqft_living: r.sqft_living,
            sqft_lot: r.sqft_lot,
            year_built: r.year_built,
            last_sale_price: r.last_sale_price,
            last_sale_date: r.last_sale_date,
            assessed_value: r.assessed_value,
            num_sales: r.num_sales,
            num_permits: r.num_permits,
        }
    }
}

/// Contents of `parcels.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelIndex {
    /// RFC 3339 generation time.
    pub generated: String,
    /// Always equal to `parcels.len()`.
    pub count: usize,
    pub parcels: Vec<ParcelRecord>,
}

impl ParcelIndex {
    pub fn new(parcels: Vec<ParcelRecord>) -> Self {
        Self {
            generated: chrono::Utc::now().to_rfc3339(),
            count: parcels.len(),
            parcels,
        }
    }
}
