//! Stage drivers: seed, scrape, parse, harvest, aggregate, status.
//!
//! Each stage reads and writes the data directory described by
//! [`PathsConfig`](crate::config::PathsConfig) and returns a report
//! instead of aborting on per-parcel failures.

use super::detail_file::{detail_from_parsed, existing_identifiers, is_file_safe, write_detail};
use super::facts::{apply_parsed, FactsDelta};
use super::index::{load_index, save_index};
use crate::acquisition::{
    cache_progress, fetch_batch, BatchProgress, BatchReport, CacheProgress, DocumentCache,
    DocumentFetcher, DocumentKind, FetchOutcome, FetchTarget, HttpClient,
};
use crate::aggregate::{write_aggregations, WrittenAggregate};
use crate::audit::{FetchLedger, LedgerSummary};
use crate::config::PipelineConfig;
use crate::extraction::parse_account;
use crate::gis::{ArcGisClient, EnrichReport, Reconciler};
use crate::model::ParcelRecord;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Failures tolerated before `harvest` considers stopping.
const HARVEST_ERROR_FLOOR: usize = 20;

fn http_client(config: &PipelineConfig) -> Result<HttpClient> {
    HttpClient::new(&config.http).context("failed to build HTTP client")
}

fn document_fetcher(config: &PipelineConfig) -> Result<DocumentFetcher> {
    let ledger = FetchLedger::open(&config.paths.fetch_ledger())?;
    let fetcher = DocumentFetcher::new(http_client(config)?, config)
        .context("invalid records-site base URL")?
        .with_ledger(Arc::new(ledger));
    Ok(fetcher)
}

fn targets(parcels: &[ParcelRecord]) -> Vec<FetchTarget> {
    parcels
        .iter()
        .map(FetchTarget::from_parcel)
        .filter(|t| t.cache_key().is_some())
        .collect()
}

fn load_parcels(config: &PipelineConfig) -> Result<Vec<ParcelRecord>> {
    let path = config.paths.parcels_json();
    let index = load_index(&path).with_context(|| {
        format!(
            "no usable parcel index at {} (run `parcelmap seed` first)",
            path.display()
        )
    })?;
    Ok(index.parcels)
}

// ── seed ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub source: String,
    pub fetched: usize,
    pub in_region: usize,
    pub parcels: usize,
    pub matched: usize,
    pub added: usize,
    pub duplicate_accounts: Vec<String>,
    pub path: PathBuf,
}

/// Build a fresh parcel index from the GIS layers.
pub async fn seed(config: &PipelineConfig) -> Result<SeedReport> {
    let client = ArcGisClient::new(http_client(config)?, config);
    let reconciled = Reconciler::new(client, config)
        .reconcile()
        .await
        .context("seed failed")?;

    let path = config.paths.parcels_json();
    save_index(&path, &reconciled.parcels)?;
    info!("wrote {} parcels to {}", reconciled.parcels.len(), path.display());

    let EnrichReport {
        matched,
        added,
        duplicate_accounts,
    } = reconciled.enrichment;
    Ok(SeedReport {
        source: reconciled.seed.source,
        fetched: reconciled.seed.fetched,
        in_region: reconciled.seed.parcels.len(),
        parcels: reconciled.parcels.len(),
        matched,
        added,
        duplicate_accounts,
        path,
    })
}

// ── scrape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub kinds: Vec<DocumentKind>,
    pub limit: Option<usize>,
    pub force: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            kinds: DocumentKind::ALL.to_vec(),
            limit: None,
            force: false,
        }
    }
}

/// Fill the document cache for every indexed parcel, in index order.
pub async fn scrape(
    config: &PipelineConfig,
    options: &ScrapeOptions,
    on_progress: impl FnMut(&BatchProgress),
) -> Result<BatchReport> {
    let parcels = load_parcels(config)?;
    let mut targets = targets(&parcels);
    if let Some(limit) = options.limit {
        targets.truncate(limit);
    }
    info!("scraping {} parcels ({} kinds)", targets.len(), options.kinds.len());

    let fetcher = document_fetcher(config)?;
    Ok(fetch_batch(&fetcher, &targets, &options.kinds, options.force, on_progress).await)
}

// ── parse ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParseReport {
    pub parcels: usize,
    /// Parcels with at least one cached page.
    pub parsed: usize,
    /// Parcels with nothing cached.
    pub skipped: usize,
    pub detail_files: usize,
    pub new_fields: FactsDelta,
}

/// Parse every cached page into detail files and parcel facts, then
/// rewrite the index.
pub fn parse(config: &PipelineConfig) -> Result<ParseReport> {
    let mut parcels = load_parcels(config)?;
    let cache = DocumentCache::new(config.paths.cache_dir());
    let sales_dir = config.paths.sales_dir();
    let mut report = ParseReport {
        parcels: parcels.len(),
        ..Default::default()
    };

    for parcel in parcels.iter_mut() {
        let target = FetchTarget::from_parcel(parcel);
        let Some(key) = target.cache_key() else {
            report.skipped += 1;
            continue;
        };

        let sales = cache.read(DocumentKind::Sales, key);
        let detail = cache.read(DocumentKind::Detail, key);
        let permits = cache.read(DocumentKind::Permit, key);
        if sales.is_none() && detail.is_none() && permits.is_none() {
            report.skipped += 1;
            continue;
        }

        let parsed = parse_account(sales.as_deref(), detail.as_deref(), permits.as_deref());
        if write_detail(&sales_dir, &detail_from_parsed(parcel, &parsed))?.is_some() {
            report.detail_files += 1;
        }
        report.new_fields += apply_parsed(parcel, &parsed);
        report.parsed += 1;
    }

    save_index(&config.paths.parcels_json(), &parcels)?;
    info!(
        "parsed {} of {} parcels ({} skipped)",
        report.parsed, report.parcels, report.skipped
    );
    Ok(report)
}

// ── harvest ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct HarvestOptions {
    pub limit: Option<usize>,
    /// Overrides `pdo.checkpoint_interval`.
    pub checkpoint_interval: Option<usize>,
    pub force: bool,
}

/// Progress after one harvested parcel.
#[derive(Debug, Clone)]
pub struct HarvestProgress {
    pub position: usize,
    pub total: usize,
    pub key: String,
    pub scraped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HarvestReport {
    /// Parcels without a detail file at the start.
    pub candidates: usize,
    pub scraped: usize,
    pub errors: usize,
    /// Index writes, including the final one.
    pub checkpoints: usize,
    pub stopped_early: bool,
    pub new_fields: FactsDelta,
}

/// Fetch and parse the detail page of every parcel that has no detail
/// file yet.
///
/// Each detail file is written as soon as its page is parsed; the index
/// is checkpointed every `checkpoint_interval` successes and once more at
/// the end. The run stops early once failures exceed the error floor and
/// outnumber successes.
pub async fn harvest(
    config: &PipelineConfig,
    options: &HarvestOptions,
    mut on_progress: impl FnMut(&HarvestProgress),
) -> Result<HarvestReport> {
    let index_path = config.paths.parcels_json();
    let sales_dir = config.paths.sales_dir();
    let mut parcels = load_parcels(config)?;
    let existing = existing_identifiers(&sales_dir)?;

    let mut pending: Vec<usize> = parcels
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let id = p.identifier();
            is_file_safe(id) && !existing.contains(id)
        })
        .map(|(idx, _)| idx)
        .collect();
    let mut report = HarvestReport {
        candidates: pending.len(),
        ..Default::default()
    };
    if let Some(limit) = options.limit {
        pending.truncate(limit);
    }
    info!(
        "{} parcels need a detail page, harvesting {}",
        report.candidates,
        pending.len()
    );

    let interval = options
        .checkpoint_interval
        .unwrap_or(config.pdo.checkpoint_interval)
        .max(1);
    let fetcher = document_fetcher(config)?;
    let total = pending.len();

    for (position, idx) in pending.into_iter().enumerate() {
        let target = FetchTarget::from_parcel(&parcels[idx]);
        let key = parcels[idx].identifier().to_string();

        match fetcher.fetch(&target, DocumentKind::Detail, options.force).await {
            FetchOutcome::Cached(html) | FetchOutcome::Fetched(html) => {
                let parsed = parse_account(None, Some(&html), None);
                let parcel = &mut parcels[idx];
                write_detail(&sales_dir, &detail_from_parsed(parcel, &parsed))?;
                report.new_fields += apply_parsed(parcel, &parsed);
                report.scraped += 1;

                if report.scraped % interval == 0 {
                    info!("checkpoint at {} scraped", report.scraped);
                    save_index(&index_path, &parcels)?;
                    report.checkpoints += 1;
                }
            }
            FetchOutcome::NotFound | FetchOutcome::Failed(_) => {
                report.errors += 1;
            }
        }

        on_progress(&HarvestProgress {
            position: position + 1,
            total,
            key,
            scraped: report.scraped,
            errors: report.errors,
        });

        if report.errors > HARVEST_ERROR_FLOOR && report.errors > report.scraped {
            error!("too many errors ({}), stopping early", report.errors);
            report.stopped_early = true;
            break;
        }
    }

    if report.scraped > 0 {
        save_index(&index_path, &parcels)?;
        report.checkpoints += 1;
    }
    info!(
        "harvest done: {} scraped, {} errors, +{} sales, +{} living areas",
        report.scraped, report.errors, report.new_fields.sale, report.new_fields.sqft_living
    );
    Ok(report)
}

// ── aggregate ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub parcels: usize,
    pub files: Vec<AggregateFileSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateFileSummary {
    pub path: PathBuf,
    pub metric: String,
    pub scheme: String,
    pub cells: usize,
}

impl From<WrittenAggregate> for AggregateFileSummary {
    fn from(w: WrittenAggregate) -> Self {
        Self {
            path: w.path,
            metric: w.metric.name().to_string(),
            scheme: w.scheme.to_string(),
            cells: w.cell_count,
        }
    }
}

/// Rebuild every aggregate file from the current index.
pub fn aggregate(config: &PipelineConfig) -> Result<AggregateReport> {
    let parcels = load_parcels(config)?;
    let files = write_aggregations(&parcels, &config.paths.aggregates_dir(), &config.aggregate)?;
    if files.is_empty() {
        warn!("no parcel has both a position and a metric; nothing written");
    }
    Ok(AggregateReport {
        parcels: parcels.len(),
        files: files.into_iter().map(Into::into).collect(),
    })
}

// ── status ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub data_dir: PathBuf,
    pub index_present: bool,
    pub generated: Option<String>,
    pub parcels: usize,
    pub with_account: usize,
    pub with_position: usize,
    pub with_sqft_living: usize,
    pub with_sale: usize,
    pub with_price_per_sqft: usize,
    pub detail_files: usize,
    pub cache: CacheProgress,
    pub ledger: LedgerSummary,
    pub aggregates: Vec<String>,
}

/// Summarize what is on disk without touching the network.
pub fn status(config: &PipelineConfig) -> Result<StatusReport> {
    let paths = &config.paths;
    let mut report = StatusReport {
        data_dir: paths.data_dir.clone(),
        detail_files: existing_identifiers(&paths.sales_dir())?.len(),
        ledger: LedgerSummary::from_path(&paths.fetch_ledger())?,
        aggregates: aggregate_names(&paths.aggregates_dir())?,
        ..Default::default()
    };

    let index_path = paths.parcels_json();
    if !index_path.exists() {
        return Ok(report);
    }
    let index = load_index(&index_path)?;
    let parcels = &index.parcels;

    report.index_present = true;
    report.generated = Some(index.generated.clone());
    report.parcels = parcels.len();
    report.with_account = parcels.iter().filter(|p| !p.account.is_empty()).count();
    report.with_position = parcels.iter().filter(|p| p.position().is_some()).count();
    report.with_sqft_living = parcels.iter().filter(|p| p.sqft_living.is_some()).count();
    report.with_sale = parcels.iter().filter(|p| p.last_sale_price.is_some()).count();
    report.with_price_per_sqft = parcels.iter().filter(|p| p.price_per_sqft().is_some()).count();
    report.cache = cache_progress(&DocumentCache::new(paths.cache_dir()), &targets(parcels));
    Ok(report)
}

fn aggregate_names(dir: &std::path::Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DETAIL_PAGE: &str = r#"<html><body>
<table>
  <tr><td class="asmt_hd">Last Sale</td></tr>
  <tr><td class="asmt_info">$450,000</td><td class="asmt_info">06/01/2021</td></tr>
</table>
<table>
  <tr><td>Living Area</td><td>1,500</td></tr>
  <tr><td>Year Built</td><td>1995</td></tr>
</table>
</body></html>"#;

    fn config_for(dir: &TempDir, server: &MockServer) -> PipelineConfig {
        let mut config = PipelineConfig::default().with_data_dir(dir.path());
        config.pdo.base_url = format!("{}/pdo/", server.uri());
        config.pdo.request_delay_ms = 0;
        config.http.backoff_ms = 10;
        config.http.timeout_secs = 5;
        config
    }

    fn seed_index(config: &PipelineConfig, parcels: &[ParcelRecord]) {
        save_index(&config.paths.parcels_json(), parcels).unwrap();
    }

    #[tokio::test]
    async fn test_harvest_updates_index_and_writes_details() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdo/Ora_asmt_details.cfm"))
            .and(query_param("account", "10059095"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pdo/Ora_asmt_details.cfm"))
            .and(query_param("maptaxlot", "391E04DB01500"))
            .respond_with(ResponseTemplate::new(404))
            .expect(2)
            .mount(&server)
            .await;

        let config = config_for(&dir, &server);
        seed_index(
            &config,
            &[
                ParcelRecord::seeded("10059095", "391E04DB01400", "1 MAIN ST", None),
                ParcelRecord::seeded("", "391E04DB01500", "", None),
                ParcelRecord::seeded("", "", "", None),
            ],
        );

        let mut seen = Vec::new();
        let report = harvest(&config, &HarvestOptions::default(), |p| seen.push(p.key.clone()))
            .await
            .unwrap();
        assert_eq!(report.candidates, 2);
        assert_eq!(report.scraped, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.checkpoints, 1);
        assert!(!report.stopped_early);
        assert_eq!(seen, vec!["10059095", "391E04DB01500"]);

        let index = load_index(&config.paths.parcels_json()).unwrap();
        let parcel = &index.parcels[0];
        assert_eq!(parcel.sqft_living, Some(1500));
        assert_eq!(parcel.last_sale_price, Some(450_000));
        assert_eq!(parcel.price_per_sqft(), Some(300.0));
        assert!(config.paths.sales_dir().join("10059095.json").exists());

        // A second run retries only the missing record.
        let again = harvest(&config, &HarvestOptions::default(), |_| {}).await;
        assert_eq!(again.unwrap().candidates, 1);
    }

    #[tokio::test]
    async fn test_harvest_stops_when_errors_dominate() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let config = config_for(&dir, &server);
        let parcels: Vec<ParcelRecord> = (0..30)
            .map(|n| ParcelRecord::seeded(format!("{}", 10_000_000 + n), "", "", None))
            .collect();
        seed_index(&config, &parcels);

        let report = harvest(&config, &HarvestOptions::default(), |_| {})
            .await
            .unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.errors, 21);
        assert_eq!(report.checkpoints, 0);
    }

    #[tokio::test]
    async fn test_harvest_checkpoints() {
        let dir = TempDir::new().unwrap();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
            .mount(&server)
            .await;

        let config = config_for(&dir, &server);
        let parcels: Vec<ParcelRecord> = (0..5)
            .map(|n| ParcelRecord::seeded(format!("{}", 10_000_000 + n), "", "", None))
            .collect();
        seed_index(&config, &parcels);

        let options = HarvestOptions {
            checkpoint_interval: Some(2),
            ..Default::default()
        };
        let report = harvest(&config, &options, |_| {}).await.unwrap();
        assert_eq!(report.scraped, 5);
        // Two periodic writes plus the final one.
        assert_eq!(report.checkpoints, 3);
        assert_eq!(report.new_fields.sqft_living, 5);
    }

    #[test]
    fn test_parse_uses_cached_pages() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default().with_data_dir(dir.path());
        seed_index(
            &config,
            &[
                ParcelRecord::seeded("", "391E04DB01400", "", Some((42.1945, -122.7095))),
                ParcelRecord::seeded("10059096", "", "", None),
            ],
        );

        let cache = DocumentCache::new(config.paths.cache_dir());
        cache
            .write(DocumentKind::Detail, "391E04DB01400", DETAIL_PAGE)
            .unwrap();
        cache
            .write(
                DocumentKind::Sales,
                "391E04DB01400",
                "<table><tr><th>Sale Date</th><th>Sale Price</th><th>Grantee</th></tr>\
                 <tr><td>06/01/2021</td><td>$450,000</td><td>NGUYEN</td></tr>\
                 <tr><td>03/14/2015</td><td>$310,000</td><td>SMITH</td></tr></table>",
            )
            .unwrap();

        let report = parse(&config).unwrap();
        assert_eq!(report.parsed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.detail_files, 1);

        let parcel = &load_index(&config.paths.parcels_json()).unwrap().parcels[0];
        assert_eq!(parcel.num_sales, Some(2));
        assert_eq!(parcel.num_permits, Some(0));
        assert_eq!(parcel.price_per_sqft(), Some(300.0));

        let aggregates = aggregate(&config).unwrap();
        assert_eq!(aggregates.parcels, 2);
        assert!(aggregates
            .files
            .iter()
            .any(|f| f.metric == "price_per_sqft" && f.scheme == "hexbin" && f.cells == 1));

        let status = status(&config).unwrap();
        assert!(status.index_present);
        assert_eq!(status.parcels, 2);
        assert_eq!(status.with_price_per_sqft, 1);
        assert_eq!(status.detail_files, 1);
        assert_eq!(status.cache.by_kind[&DocumentKind::Detail], 1);
        assert!(status.aggregates.contains(&"grid-price_per_sqft.json".to_string()));
    }

    #[test]
    fn test_status_without_index() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default().with_data_dir(dir.path());
        let report = status(&config).unwrap();
        assert!(!report.index_present);
        assert_eq!(report.parcels, 0);
        assert!(report.aggregates.is_empty());
        assert!(parse(&config).is_err());
    }
}
