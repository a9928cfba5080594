//! `indicatif` progress bars for long-running stages.

use super::output;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TICKS: &str = "\u{25b8}\u{25b9}\u{25b8}\u{25b9}\u{25b8}";

/// A counting bar over `total` items, hidden under `--quiet` / `--json`.
pub fn batch_bar(total: usize, label: &str) -> ProgressBar {
    if output::is_quiet() || output::is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "  {spinner:.cyan} {prefix:<8} [{bar:30.cyan/blue}] {pos}/{len} {msg} ({eta})",
    ) {
        bar.set_style(style.progress_chars("\u{2588}\u{2589}\u{2591}").tick_chars(TICKS));
    }
    bar.set_prefix(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// An indeterminate spinner, hidden under `--quiet` / `--json`.
pub fn spinner(message: &str) -> ProgressBar {
    if output::is_quiet() || output::is_json() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg}") {
        bar.set_style(style.tick_chars(TICKS));
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
