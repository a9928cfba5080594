//! `parcelmap aggregate`: rebuild hexbin and grid files.

use crate::cli::output::{self, Styled};
use crate::config::PipelineConfig;
use crate::pipeline;
use anyhow::Result;

pub fn run(config: &PipelineConfig) -> Result<()> {
    let s = Styled::new();
    let report = pipeline::aggregate(config)?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::print_section(&s, "Aggregate");
    for file in &report.files {
        output::print_check(
            s.ok_sym(),
            &format!("{}-{}", file.scheme, file.metric),
            &format!("{} cells", file.cells),
        );
    }
    if report.files.is_empty() {
        output::print_check(s.warn_sym(), "Nothing written", "no priced, placed parcels");
    }
    output::print_status(
        &s,
        &s.green("done"),
        &format!(
            "{} files from {} parcels in {}",
            report.files.len(),
            report.parcels,
            config.paths.aggregates_dir().display()
        ),
    );
    Ok(())
}
