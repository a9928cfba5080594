//! Parcel geometry and attributes from county and state ArcGIS layers.
//!
//! Seed parcels come from the first reachable layer in a fixed priority
//! order, are filtered to the target region, and are then enriched with
//! account numbers and assessment attributes keyed by map/taxlot.

pub mod arcgis;
pub mod features;
pub mod geometry;
pub mod maptaxlot;
pub mod reconcile;

pub use arcgis::{ArcGisClient, LayerQuery};
pub use features::{from_esri_json, from_geojson, QueryPage, RawParcel};
pub use maptaxlot::normalize;
pub use reconcile::{
    enrich, filter_region, EnrichReport, EnrichmentIndex, EnrichmentRecord, Reconciled,
    Reconciler, SeedSet,
};
