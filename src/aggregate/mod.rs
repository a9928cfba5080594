//! Hexagonal and rectangular spatial aggregation of parcel metrics.
//!
//! Aggregates are always rebuilt from the full parcel set; nothing is
//! updated incrementally and empty cells are never emitted.

pub mod grid;
pub mod hexbin;
pub mod stats;
pub mod writer;

pub use grid::{aggregate_grid, grid_center, grid_coords};
pub use hexbin::{aggregate_hexbin, hex_center, hex_coords};
pub use stats::{CellStats, Metric};
pub use writer::{write_aggregations, WrittenAggregate};
