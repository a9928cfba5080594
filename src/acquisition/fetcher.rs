//! Cache-first document fetcher for the records site.

use super::cache::DocumentCache;
use super::http_client::HttpClient;
use super::rate_limiter::RateLimiter;
use super::retry::RetryPolicy;
use super::target::{DocumentKind, FetchTarget};
use crate::audit::{FetchEvent, FetchLedger};
use crate::config::PipelineConfig;
use crate::error::FetchError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// How a fetch request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Served from the cache; no request made.
    Cached(String),
    /// Fetched live and written to the cache.
    Fetched(String),
    /// The site has no such record, or the target has no identifier.
    NotFound,
    /// Every attempt failed; holds the last error.
    Failed(String),
}

/// Outcome without the body, for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
    Cached,
    Fetched,
    NotFound,
    Failed,
}

impl FetchOutcome {
    pub fn status(&self) -> FetchStatus {
        match self {
            FetchOutcome::Cached(_) => FetchStatus::Cached,
            FetchOutcome::Fetched(_) => FetchStatus::Fetched,
            FetchOutcome::NotFound => FetchStatus::NotFound,
            FetchOutcome::Failed(_) => FetchStatus::Failed,
        }
    }
}

/// Fetches per-account pages, cache first, with politeness spacing and
/// retries on live requests.
pub struct DocumentFetcher {
    client: HttpClient,
    base_url: Url,
    cache: DocumentCache,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    min_body_len: usize,
    ledger: Option<Arc<FetchLedger>>,
}

impl DocumentFetcher {
    pub fn new(client: HttpClient, config: &PipelineConfig) -> Result<Self, FetchError> {
        let mut base = config.pdo.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            cache: DocumentCache::new(config.paths.cache_dir()),
            limiter: Arc::new(RateLimiter::sequential(config.pdo.request_delay_ms)),
            retry: RetryPolicy::from_config(&config.http),
            min_body_len: config.pdo.min_body_len,
            ledger: None,
        })
    }

    /// Record every live attempt in `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<FetchLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    pub fn document_url(&self, kind: DocumentKind, target: &FetchTarget) -> Option<Url> {
        let (param, value) = target.query()?;
        let mut url = self.base_url.join(kind.endpoint()).ok()?;
        url.query_pairs_mut().append_pair(param, &value);
        Some(url)
    }

    /// Return the document body from cache, or fetch it live.
    ///
    /// `force` skips the cache read but still writes the fresh body.
    pub async fn fetch(&self, target: &FetchTarget, kind: DocumentKind, force: bool) -> FetchOutcome {
        let Some(key) = target.cache_key() else {
            debug!("{kind}: target has neither account nor map/taxlot");
            return FetchOutcome::NotFound;
        };

        if !force {
            if let Some(body) = self.cache.read(kind, key) {
                debug!("{kind} {key}: cache hit");
                return FetchOutcome::Cached(body);
            }
        }

        let Some(url) = self.document_url(kind, target) else {
            return FetchOutcome::Failed(format!("could not build {kind} url for {key}"));
        };

        let result = self
            .retry
            .run(&format!("{kind} {key}"), |attempt| self.attempt(&url, kind, key, attempt))
            .await;

        match result {
            Ok(body) => {
                if let Err(e) = self.cache.write(kind, key, &body) {
                    warn!("{kind} {key}: cache write failed: {e}");
                    return FetchOutcome::Failed(FetchError::Cache(e).to_string());
                }
                info!("{kind} {key}: fetched {} bytes", body.len());
                FetchOutcome::Fetched(body)
            }
            Err(FetchError::NotFound { .. }) => {
                warn!("{kind} {key}: not found");
                FetchOutcome::NotFound
            }
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        kind: DocumentKind,
        key: &str,
        attempt: u32,
    ) -> Result<String, FetchError> {
        let _guard = self.limiter.acquire().await;
        let started = Instant::now();
        let result = self.client.get(url).await;

        let mut event = FetchEvent::new(kind.tag(), key, url.as_str(), attempt);
        event.duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(resp) if resp.status == 404 => {
                event.http_status = Some(404);
                Err(FetchError::NotFound {
                    url: url.to_string(),
                })
            }
            Ok(resp) if !resp.is_success() => {
                event.http_status = Some(resp.status);
                Err(FetchError::Status {
                    status: resp.status,
                    url: url.to_string(),
                })
            }
            Ok(resp) => {
                event.http_status = Some(resp.status);
                event.bytes = Some(resp.body.len());
                if resp.body.len() < self.min_body_len {
                    warn!(
                        "{kind} {key}: suspiciously short response ({} bytes)",
                        resp.body.len()
                    );
                }
                Ok(resp.body)
            }
            Err(e) => Err(FetchError::Transport(e)),
        };

        event.status = match &outcome {
            Ok(_) => "ok",
            Err(FetchError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        }
        .to_string();
        if let Err(e) = &outcome {
            event.error = Some(e.to_string());
        }
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.record(&event) {
                warn!("fetch ledger write failed: {e}");
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::LedgerSummary;
    use crate::config::PipelineConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = "<html><body><table><tr><th>Sale Date</th><th>Sale Price</th>\
                        <th>Grantee</th></tr><tr><td>06/01/2021</td><td>$450,000</td>\
                        <td>NGUYEN ANH</td></tr></table><p>padding padding padding padding \
                        padding padding padding padding</p></body></html>";

    fn test_config(dir: &std::path::Path, server: &MockServer) -> PipelineConfig {
        let mut config = PipelineConfig::default().with_data_dir(dir);
        config.pdo.base_url = format!("{}/pdo/", server.uri());
        config.pdo.request_delay_ms = 0;
        config.http.backoff_ms = 10;
        config
    }

    fn fetcher(config: &PipelineConfig) -> DocumentFetcher {
        let client = HttpClient::new(&config.http).unwrap();
        DocumentFetcher::new(client, config).unwrap()
    }

    #[tokio::test]
    async fn test_live_fetch_then_cache_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdo/sales.cfm"))
            .and(query_param("account", "10012345"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);
        let target = FetchTarget::new("10012345", "391E04DB01400");

        let first = f.fetch(&target, DocumentKind::Sales, false).await;
        assert_eq!(first, FetchOutcome::Fetched(PAGE.to_string()));
        assert!(f.cache().contains(DocumentKind::Sales, "10012345"));

        let second = f.fetch(&target, DocumentKind::Sales, false).await;
        assert_eq!(second, FetchOutcome::Cached(PAGE.to_string()));
    }

    #[tokio::test]
    async fn test_precached_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);
        f.cache().write(DocumentKind::Detail, "10012345", "<cached/>").unwrap();

        let target = FetchTarget::new("10012345", "");
        let outcome = f.fetch(&target, DocumentKind::Detail, false).await;
        assert_eq!(outcome, FetchOutcome::Cached("<cached/>".to_string()));
    }

    #[tokio::test]
    async fn test_force_refetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdo/Ora_asmt_details.cfm"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);
        f.cache().write(DocumentKind::Detail, "10012345", "<stale/>").unwrap();

        let target = FetchTarget::new("10012345", "");
        let outcome = f.fetch(&target, DocumentKind::Detail, true).await;
        assert_eq!(outcome.status(), FetchStatus::Fetched);
        assert_eq!(f.cache().read(DocumentKind::Detail, "10012345").as_deref(), Some(PAGE));
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pdo/permit.cfm"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);

        let target = FetchTarget::new("10012345", "");
        let outcome = f.fetch(&target, DocumentKind::Permit, false).await;
        assert_eq!(outcome, FetchOutcome::NotFound);
        assert!(!f.cache().contains(DocumentKind::Permit, "10012345"));
    }

    #[tokio::test]
    async fn test_server_errors_retried_to_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let ledger = Arc::new(FetchLedger::open(&config.paths.fetch_ledger()).unwrap());
        let f = fetcher(&config).with_ledger(ledger);

        let target = FetchTarget::new("", "391E04DB01400");
        let outcome = f.fetch(&target, DocumentKind::Sales, false).await;
        assert!(matches!(outcome, FetchOutcome::Failed(ref e) if e.contains("500")));
        assert!(!f.cache().contains(DocumentKind::Sales, "391E04DB01400"));

        let summary = LedgerSummary::from_path(&config.paths.fetch_ledger()).unwrap();
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.by_kind["sales"]["error"], 3);
    }

    #[tokio::test]
    async fn test_short_body_still_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("maptaxlot", "391E04DB01400"))
            .respond_with(ResponseTemplate::new(200).set_body_string("No records"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);

        let target = FetchTarget::new("", "391E04DB01400");
        let outcome = f.fetch(&target, DocumentKind::Sales, false).await;
        assert_eq!(outcome, FetchOutcome::Fetched("No records".to_string()));
        assert!(f.cache().contains(DocumentKind::Sales, "391E04DB01400"));
    }

    #[tokio::test]
    async fn test_target_without_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path(), &server);
        let f = fetcher(&config);
        let outcome = f.fetch(&FetchTarget::default(), DocumentKind::Sales, false).await;
        assert_eq!(outcome, FetchOutcome::NotFound);
    }
}
