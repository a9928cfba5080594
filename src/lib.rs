//! parcelmap: county parcel market data, from GIS layers and records pages
//! to hexbin and grid price maps.
//!
//! Stages run in order, each reading and writing under the data directory:
//! `seed` (GIS reconciliation into `parcels.json`), `scrape` / `harvest`
//! (page cache), `parse` (structured extraction back into the index) and
//! `aggregate` (spatial statistics).

pub mod acquisition;
pub mod aggregate;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod gis;
pub mod model;
pub mod pipeline;
