//! `parcelmap all`: seed (if needed), scrape, parse, aggregate.

use crate::cli::{aggregate_cmd, parse_cmd, scrape_cmd, seed_cmd};
use crate::config::PipelineConfig;
use crate::pipeline::ScrapeOptions;
use anyhow::Result;
use tracing::info;

pub async fn run(config: &PipelineConfig, reseed: bool, options: &ScrapeOptions) -> Result<()> {
    if reseed || !config.paths.parcels_json().exists() {
        seed_cmd::run(config).await?;
    } else {
        info!("using existing index {}", config.paths.parcels_json().display());
    }
    scrape_cmd::run(config, options).await?;
    parse_cmd::run(config)?;
    aggregate_cmd::run(config)
}
