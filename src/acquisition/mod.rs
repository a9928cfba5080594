//! Document acquisition from the county records site.
//!
//! Cache-first fetching with a politeness delay between live requests,
//! bounded retries with exponential backoff, and atomic cache writes.

pub mod batch;
pub mod cache;
pub mod fetcher;
pub mod http_client;
pub mod rate_limiter;
pub mod retry;
pub mod target;

pub use batch::{cache_progress, fetch_batch, BatchProgress, BatchReport, CacheProgress};
pub use cache::DocumentCache;
pub use fetcher::{DocumentFetcher, FetchOutcome, FetchStatus};
pub use http_client::{HttpClient, HttpResponse};
pub use rate_limiter::RateLimiter;
pub use retry::{RetryPolicy, Retryable};
pub use target::{DocumentKind, FetchTarget};
