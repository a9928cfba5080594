//! `parcelmap scrape`: fill the page cache.

use crate::acquisition::{DocumentKind, FetchStatus};
use crate::cli::output::{self, Styled};
use crate::cli::progress;
use crate::config::PipelineConfig;
use crate::pipeline::{self, ScrapeOptions};
use anyhow::Result;

pub async fn run(config: &PipelineConfig, options: &ScrapeOptions) -> Result<()> {
    let s = Styled::new();
    let mut bar = None;
    let started = std::time::Instant::now();

    let report = pipeline::scrape(config, options, |p| {
        let bar = bar.get_or_insert_with(|| progress::batch_bar(p.total, "scrape"));
        let failed = p.statuses.iter().any(|(_, st)| *st == FetchStatus::Failed);
        bar.set_message(if failed { format!("{} (failed)", p.key) } else { p.key.clone() });
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

    let kinds: Vec<&str> = options.kinds.iter().map(DocumentKind::tag).collect();
    output::print_section(&s, "Scrape");
    output::print_check(s.info_sym(), "Parcels", &report.targets.to_string());
    output::print_check(s.info_sym(), "Pages", &kinds.join(", "));
    output::print_check(s.ok_sym(), "Cached", &report.cached.to_string());
    output::print_check(s.ok_sym(), "Fetched", &report.fetched.to_string());
    output::print_check(s.warn_sym(), "Not found", &report.not_found.to_string());
    let failed_sym = if report.failed > 0 { s.fail_sym() } else { s.ok_sym() };
    output::print_check(failed_sym, "Failed", &report.failed.to_string());
    output::print_status(
        &s,
        &s.green("done"),
        &output::format_duration(started.elapsed().as_secs()),
    );
    Ok(())
}
