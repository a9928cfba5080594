//! `parcelmap status`: what is on disk so far.

use crate::acquisition::DocumentKind;
use crate::cli::output::{self, Styled};
use crate::config::PipelineConfig;
use crate::pipeline;
use anyhow::Result;

pub fn run(config: &PipelineConfig) -> Result<()> {
    let s = Styled::new();
    let report = pipeline::status(config)?;

    if output::is_json() {
        output::print_json(&report);
        return Ok(());
    }

    eprintln!(
        "  {} {}",
        s.bold("parcelmap"),
        s.dim(&format!("v{}", env!("CARGO_PKG_VERSION")))
    );
    eprintln!("  {}", s.dim(&report.data_dir.display().to_string()));
    eprintln!();

    output::print_section(&s, "Index");
    if !report.index_present {
        output::print_check(
            s.fail_sym(),
            "parcels.json",
            &s.red("missing (run `parcelmap seed`)"),
        );
        return Ok(());
    }
    let total = report.parcels;
    output::print_check(s.ok_sym(), "Parcels", &total.to_string());
    if let Some(generated) = &report.generated {
        output::print_check(s.info_sym(), "Generated", generated);
    }
    for (label, n) in [
        ("With account", report.with_account),
        ("With position", report.with_position),
        ("With living area", report.with_sqft_living),
        ("With sale", report.with_sale),
        ("With $/sqft", report.with_price_per_sqft),
    ] {
        output::print_check(s.info_sym(), label, &output::format_ratio(n, total));
    }
    eprintln!();

    output::print_section(&s, "Cache");
    for kind in DocumentKind::ALL {
        let n = report.cache.by_kind.get(&kind).copied().unwrap_or(0);
        output::print_check(
            s.info_sym(),
            kind.tag(),
            &output::format_ratio(n, report.cache.targets),
        );
    }
    output::print_check(
        s.info_sym(),
        "complete",
        &output::format_ratio(report.cache.complete, report.cache.targets),
    );
    output::print_check(s.info_sym(), "detail files", &report.detail_files.to_string());
    eprintln!();

    output::print_section(&s, "Fetch ledger");
    output::print_check(s.info_sym(), "Attempts", &report.ledger.attempts.to_string());
    for (kind, statuses) in &report.ledger.by_kind {
        let summary: Vec<String> = statuses.iter().map(|(st, n)| format!("{st} {n}")).collect();
        output::print_check(s.info_sym(), kind, &summary.join(", "));
    }
    eprintln!();

    output::print_section(&s, "Aggregates");
    if report.aggregates.is_empty() {
        output::print_check(s.info_sym(), "none", "");
    }
    for name in &report.aggregates {
        output::print_check(s.ok_sym(), &s.cyan(name), "");
    }
    Ok(())
}
