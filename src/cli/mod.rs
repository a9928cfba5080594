//! CLI subcommand implementations for the `parcelmap` binary.

pub mod aggregate_cmd;
pub mod all_cmd;
pub mod harvest_cmd;
pub mod output;
pub mod parse_cmd;
pub mod progress;
pub mod scrape_cmd;
pub mod seed_cmd;
pub mod status;
