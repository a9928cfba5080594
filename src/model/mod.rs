//! Record types shared by every pipeline stage and the files they persist.

pub mod cell;
pub mod detail;
pub mod parcel;

pub use cell::{AggregateFile, AggregationCell, Binning, CellCoords};
pub use detail::{DetailFile, ImprovementRecord, PermitRecord, SaleRecord};
pub use parcel::{ParcelIndex, ParcelRecord};
