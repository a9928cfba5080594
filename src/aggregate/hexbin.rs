//! Flat-top hexagonal binning in axial coordinates.
//!
//! Hex size is in degrees. Latitude is stretched by `1 / cos(lat)` before
//! rounding so cells stay roughly equal-area away from the equator.

use super::stats::{group_by_cell, round6, CellStats, Metric};
use crate::model::{AggregationCell, CellCoords, ParcelRecord};

fn row_height(size: f64, lat: f64) -> f64 {
    size * 3f64.sqrt() / lat.to_radians().cos()
}

/// Odd columns sit half a row up.
fn column_offset(q: i64) -> f64 {
    0.5 * q.rem_euclid(2) as f64
}

/// Axial `(q, r)` of the hex containing a point. Halfway values round to
/// the even neighbour.
pub fn hex_coords(lat: f64, lng: f64, size: f64) -> (i64, i64) {
    let q = (lng / (size * 1.5)).round_ties_even() as i64;
    let r = (lat / row_height(size, lat) - column_offset(q)).round_ties_even() as i64;
    (q, r)
}

/// Center of hex `(q, r)`. Uses a single reference latitude for the
/// stretch, so centers are only exact near it.
pub fn hex_center(q: i64, r: i64, size: f64, reference_lat: f64) -> (f64, f64) {
    let lng = q as f64 * size * 1.5;
    let lat = (r as f64 + column_offset(q)) * row_height(size, reference_lat);
    (round6(lat), round6(lng))
}

/// Hex cells for one metric, ordered by `(q, r)`.
pub fn aggregate_hexbin(
    parcels: &[ParcelRecord],
    metric: Metric,
    size: f64,
    reference_lat: f64,
) -> Vec<AggregationCell> {
    group_by_cell(parcels, metric, |lat, lng| hex_coords(lat, lng, size))
        .into_iter()
        .filter_map(|((q, r), values)| {
            let stats = CellStats::from_values(&values)?;
            let (lat, lng) = hex_center(q, r, size, reference_lat);
            Some(AggregationCell {
                coords: CellCoords::Hex { q, r },
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_q_ties_round_to_even() {
        assert_eq!(hex_coords(0.0, 0.75, 1.0).0, 0);
        assert_eq!(hex_coords(0.0, 2.25, 1.0).0, 2);
        assert_eq!(hex_coords(0.0, -0.75, 1.0).0, 0);
    }

    #[test]
    fn test_odd_column_offset() {
        // q = 1 shifts rows by half: lat 0 lands on r = round(-0.5) = 0.
        assert_eq!(hex_coords(0.0, 1.5, 1.0), (1, 0));
        // One row height up in an odd column.
        let h = 3f64.sqrt();
        assert_eq!(hex_coords(h * 1.5, 1.5, 1.0), (1, 1));
        assert_eq!(hex_coords(h * 1.5, -1.5, 1.0), (-1, 1));
    }

    #[test]
    fn test_center_round_trip_near_reference() {
        let size = 0.001;
        let reference = 42.1945;
        let (q, r) = hex_coords(reference, -122.7095, size);
        let (lat, lng) = hex_center(q, r, size, reference);
        assert_eq!(hex_coords(lat, lng, size), (q, r));
        assert!((lng - -122.7095).abs() <= size);
    }

    #[test]
    fn test_three_parcels_one_cell() {
        let parcels: Vec<ParcelRecord> = [(450_000, 2250), (450_000, 1800), (450_000, 1500)]
            .iter()
            .map(|&(price, living)| {
                let mut p = ParcelRecord::seeded("", "", "", Some((42.1945, -122.7095)));
                p.last_sale_price = Some(price);
                p.sqft_living = Some(living);
                p
            })
            .collect();

        let cells = aggregate_hexbin(&parcels, Metric::PricePerSqft, 0.001, 42.1945);
        assert_eq!(cells.len(), 1);
        let cell = &cells[0];
        assert_eq!(cell.count, 3);
        assert_eq!(cell.mean, 250.0);
        assert_eq!(cell.median, 250.0);
        assert_eq!(cell.min, 200.0);
        assert_eq!(cell.max, 300.0);
    }

    #[test]
    fn test_empty_input_no_cells() {
        assert!(aggregate_hexbin(&[], Metric::PricePerSqft, 0.001, 42.1945).is_empty());
    }
}
