//! `parcelmap parse`: extract facts from cached pages.

use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::PipelineConfig;
use crate::pipeline;
use anyhow::Result;

pub fn run(config: &PipelineConfig) -> Result<()> {
    let s = Styled::new();
    let spinner = progress::spinner("parsing cached pages");
    let result = pipeline::parse(config);
    spinner.finish_and_clear();
    let report = result?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::print_section(&s, "Parse");
    output::print_check(
        s.ok_sym(),
        "Parsed",
        &output::format_ratio(report.parsed, report.parcels),
    );
    output::print_check(s.info_sym(), "Nothing cached", &report.skipped.to_string());
    output::print_check(s.info_sym(), "Detail files", &report.detail_files.to_string());
    let new = &report.new_fields;
    output::print_check(
        s.info_sym(),
        "New fields",
        &format!(
            "+{} sales, +{} living area, +{} lot, +{} year, +{} assessed",
            new.sale, new.sqft_living, new.sqft_lot, new.year_built, new.assessed_value
        ),
    );
    output::print_status(&s, &s.green("done"), "index updated");
    Ok(())
}
