//! Aggregation cells and the files they are written to.

use serde::{Deserialize, Serialize};

/// Bucket coordinates for either binning scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellCoords {
    /// Axial hex coordinates.
    Hex { q: i64, r: i64 },
    /// Rectangular grid row/column.
    Grid { row: i64, col: i64 },
}

/// Statistics of one metric within one spatial bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationCell {
    #[serde(flatten)]
    pub coords: CellCoords,
    /// Center latitude.
    pub lat: f64,
    /// Center longitude.
    pub lng: f64,
    pub count: usize,
    pub median: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Binning scheme name plus its size parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregation", rename_all = "lowercase")]
pub enum Binning {
    Hexbin { hex_size_deg: f64 },
    Grid { grid_size_deg: f64 },
}

impl Binning {
    pub fn name(&self) -> &'static str {
        match self {
            Binning::Hexbin { .. } => "hexbin",
            Binning::Grid { .. } => "grid",
        }
    }
}

/// Contents of `aggregates/<scheme>-<metric>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFile {
    pub generated: String,
    pub metric: String,
    #[serde(flatten)]
    pub binning: Binning,
    /// Always equal to `cells.len()`.
    pub cell_count: usize,
    pub cells: Vec<AggregationCell>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_cell_shape() {
        let cell = AggregationCell {
            coords: CellCoords::Hex { q: -81806, r: 32847 },
            lat: 42.19,
            lng: -122.709,
            count: 3,
            median: 250.0,
            mean: 250.0,
            min: 200.0,
            max: 300.0,
        };
        let v = serde_json::to_value(&cell).unwrap();
        assert_eq!(v["q"], -81806);
        assert_eq!(v["r"], 32847);
        assert!(v.get("row").is_none());
        assert_eq!(v["count"], 3);
    }

    #[test]
    fn test_file_header_flattens_binning() {
        let file = AggregateFile {
            generated: "2026-01-01T00:00:00+00:00".into(),
            metric: "price_per_sqft".into(),
            binning: Binning::Grid {
                grid_size_deg: 0.001,
            },
            cell_count: 0,
            cells: vec![],
        };
        let v = serde_json::to_value(&file).unwrap();
        assert_eq!(v["aggregation"], "grid");
        assert_eq!(v["grid_size_deg"], 0.001);
        assert_eq!(v["cell_count"], 0);

        let back: AggregateFile = serde_json::from_value(v).unwrap();
        assert_eq!(back.binning.name(), "grid");
    }
}
