//! Persistence and the stage drivers that move data through the pipeline.

pub mod detail_file;
pub mod facts;
pub mod index;
pub mod stages;

pub use facts::{apply_parsed, FactsDelta};
pub use index::{load_index, save_index};
pub use stages::{
    aggregate, harvest, parse, scrape, seed, status, AggregateReport, HarvestOptions,
    HarvestProgress, HarvestReport, ParseReport, ScrapeOptions, SeedReport, StatusReport,
};
