//! `parcelmap seed`: build the parcel index from GIS layers.

use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::PipelineConfig;
use crate::pipeline;
use anyhow::Result;

pub async fn run(config: &PipelineConfig) -> Result<()> {
    let s = Styled::new();
    let spinner = progress::spinner("querying parcel layers");
    let result = pipeline::seed(config).await;
    spinner.finish_and_clear();
    let report = result?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::print_section(&s, "Seed");
    output::print_check(s.ok_sym(), "Source", &report.source);
    output::print_check(
        s.info_sym(),
        "Fetched",
        &format!("{} ({} in region)", report.fetched, report.in_region),
    );
    output::print_check(
        s.info_sym(),
        "Enrichment",
        &format!("{} matched, {} added", report.matched, report.added),
    );
    if !report.duplicate_accounts.is_empty() {
        output::print_check(
            s.warn_sym(),
            "Duplicates",
            &format!("{} accounts on more than one parcel", report.duplicate_accounts.len()),
        );
    }
    output::print_status(
        &s,
        &s.green("written"),
        &format!("{} parcels in {}", report.parcels, report.path.display()),
    );
    Ok(())
}
