//! Rectangular grid binning.

use super::stats::{group_by_cell, round6, CellStats, Metric};
use crate::model::{AggregationCell, CellCoords, ParcelRecord};

/// `(row, col)` by floor division of latitude and longitude.
pub fn grid_coords(lat: f64, lng: f64, size: f64) -> (i64, i64) {
    ((lat / size).floor() as i64, (lng / size).floor() as i64)
}

/// Midpoint of cell `(row, col)`.
pub fn grid_center(row: i64, col: i64, size: f64) -> (f64, f64) {
    (
        round6((row as f64 + 0.5) * size),
        round6((col as f64 + 0.5) * size),
    )
}

/// Grid cells for one metric, ordered by `(row, col)`.
pub fn aggregate_grid(parcels: &[ParcelRecord], metric: Metric, size: f64) -> Vec<AggregationCell> {
    group_by_cell(parcels, metric, |lat, lng| grid_coords(lat, lng, size))
        .into_iter()
        .filter_map(|((row, col), values)| {
            let stats = CellStats::from_values(&values)?;
            let (lat, lng) = grid_center(row, col, size);
            Some(AggregationCell {
                coords: CellCoords::Grid { row, col },
                lat,
                lng,
                count: stats.count,
                median: stats.median,
                mean: stats.mean,
                min: stats.min,
                max: stats.max,
            })
        })
        .collect()
}
