//! Sequential batch fetching with progress reporting.

use super::cache::DocumentCache;
use super::fetcher::{DocumentFetcher, FetchStatus};
use super::target::{DocumentKind, FetchTarget};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Progress after one target has been processed.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    /// 1-based position in the input.
    pub position: usize,
    pub total: usize,
    pub key: String,
    pub statuses: Vec<(DocumentKind, FetchStatus)>,
}

/// Counts over a whole batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub targets: usize,
    pub cached: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, status: FetchStatus) {
        match status {
            FetchStatus::Cached => self.cached += 1,
            FetchStatus::Fetched => self.fetched += 1,
            FetchStatus::NotFound => self.not_found += 1,
            FetchStatus::Failed => self.failed += 1,
        }
    }
}

/// Fetch every `(target, kind)` pair in input order.
///
/// Already-cached pairs are served from disk without delay, so a rerun
/// after an interruption picks up where the last one stopped.
pub async fn fetch_batch(
    fetcher: &DocumentFetcher,
    targets: &[FetchTarget],
    kinds: &[DocumentKind],
    force: bool,
    mut on_progress: impl FnMut(&BatchProgress),
) -> BatchReport {
    let mut report = BatchReport {
        targets: targets.len(),
        ..Default::default()
    };

    for (idx, target) in targets.iter().enumerate() {
        let mut statuses = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let status = fetcher.fetch(target, *kind, force).await.status();
            report.record(status);
            statuses.push((*kind, status));
        }

        on_progress(&BatchProgress {
            position: idx + 1,
            total: targets.len(),
            key: target.cache_key().unwrap_or_default().to_string(),
            statuses,
        });
    }

    info!(
        "batch done: {} targets, {} cached, {} fetched, {} not found, {} failed",
        report.targets, report.cached, report.fetched, report.not_found, report.failed
    );
    report
}

/// How much of the target list is already on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheProgress {
    pub targets: usize,
    pub by_kind: BTreeMap<DocumentKind, usize>,
    /// Targets with every kind cached.
    pub complete: usize,
}

pub fn cache_progress(cache: &DocumentCache, targets: &[FetchTarget]) -> CacheProgress {
    let mut progress = CacheProgress {
        targets: targets.len(),
        ..Default::default()
    };

    for target in targets {
        let Some(key) = target.cache_key() else {
            continue;
        };
        let mut all = true;
        for kind in DocumentKind::ALL {
            if cache.contains(kind, key) {
                *progress.by_kind.entry(kind).or_default() += 1;
            } else {
                all = false;
            }
        }
        if all {
            progress.complete += 1;
        }
    }
    progress
}
