//! `parcelmap harvest`: detail pages for parcels without a detail file.

use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::PipelineConfig;
use crate::pipeline::{self, HarvestOptions};
use anyhow::Result;

pub async fn run(config: &PipelineConfig, options: &HarvestOptions) -> Result<()> {
    let s = Styled::new();
    let mut bar = None;
    let started = std::time::Instant::now();

    let report = pipeline::harvest(config, options, |p| {
        let bar = bar.get_or_insert_with(|| progress::batch_bar(p.total, "harvest"));
        bar.set_message(format!("{} ok, {} err", p.scraped, p.errors));
        bar.set_position(p.position as u64);
    })
    .await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    output::print_section(&s, "Harvest");
    output::print_check(s.info_sym(), "Candidates", &report.candidates.to_string());
    output::print_check(s.ok_sym(), "Scraped", &report.scraped.to_string());
    let err_sym = if report.errors > 0 { s.warn_sym() } else { s.ok_sym() };
    output::print_check(err_sym, "Errors", &report.errors.to_string());
    output::print_check(s.info_sym(), "Checkpoints", &report.checkpoints.to_string());
    output::print_check(
        s.info_sym(),
        "New fields",
        &format!(
            "+{} sales, +{} living area",
            report.new_fields.sale, report.new_fields.sqft_living
        ),
    );

    let elapsed = output::format_duration(started.elapsed().as_secs());
    if report.stopped_early {
        output::print_status(&s, &s.yellow("stopped early"), &format!("too many errors, {elapsed}"));
    } else {
        output::print_status(&s, &s.green("done"), &elapsed);
    }
    Ok(())
}
