//! Per-cell summary statistics.

use crate::model::parcel::round2;
use crate::model::ParcelRecord;
use std::collections::BTreeMap;

/// A numeric parcel attribute that can be aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    PricePerSqft,
    PricePerSqftLot,
    LastSalePrice,
    AssessedValue,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::PricePerSqft,
        Metric::PricePerSqftLot,
        Metric::LastSalePrice,
        Metric::AssessedValue,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::PricePerSqft => "price_per_sqft",
            Metric::PricePerSqftLot => "price_per_sqft_lot",
            Metric::LastSalePrice => "last_sale_price",
            Metric::AssessedValue => "assessed_value",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    pub fn value(&self, parcel: &ParcelRecord) -> Option<f64> {
        match self {
            Metric::PricePerSqft => parcel.price_per_sqft(),
            Metric::PricePerSqftLot => parcel.price_per_sqft_lot(),
            Metric::LastSalePrice => parcel.last_sale_price.map(|v| v as f64),
            Metric::AssessedValue => parcel.assessed_value.map(|v| v as f64),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Count, mean, median, min and max of one cell's values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStats {
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl CellStats {
    /// `None` for an empty slice. The median is the element at `n / 2` of
    /// the sorted values: for an even count that is the upper middle value.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let sum: f64 = values.iter().sum();
        Some(Self {
            count: n,
            median: sorted[n / 2],
            mean: round2(sum / n as f64),
            min: sorted[0],
            max: sorted[n - 1],
        })
    }
}

/// Metric values grouped by cell key. Parcels without a position or
/// without the metric are left out.
pub fn group_by_cell<K, F>(parcels: &[ParcelRecord], metric: Metric, key: F) -> BTreeMap<K, Vec<f64>>
where
    K: Ord,
    F: Fn(f64, f64) -> K,
{
    let mut cells: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for parcel in parcels {
        let (Some((lat, lng)), Some(value)) = (parcel.position(), metric.value(parcel)) else {
            continue;
        };
        cells.entry(key(lat, lng)).or_default().push(value);
    }
    cells
}

pub(crate) fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}
