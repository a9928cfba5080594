//! Error types for the network-facing layers.
//!
//! Extraction never errors (it degrades to partial records), and stage
//! drivers use `anyhow`. Only the fetch and GIS seams carry typed errors
//! so callers can tell a terminal miss from a retryable failure.

use thiserror::Error;

/// A single failed attempt against the property-records site.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered 404: the record does not exist.
    #[error("record not found ({url})")]
    NotFound { url: String },

    /// Any other non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Connection failure, timeout, or body read error.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Could not build the request URL.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Cache write failed after a successful fetch.
    #[error("cache write failed: {0}")]
    Cache(#[from] std::io::Error),
}

impl FetchError {
    /// Whether retrying could change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NotFound { .. } | FetchError::Url(_) | FetchError::Cache(_) => false,
            FetchError::Status { .. } | FetchError::Transport(_) => true,
        }
    }
}

/// Failures while querying ArcGIS layers.
#[derive(Debug, Error)]
pub enum GisError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON from {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The layer answered 200 with an embedded `"error"` object.
    #[error("ArcGIS error from {url}: {message}")]
    Service { url: String, message: String },

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// No seed source produced a single parcel.
    #[error("no parcel source returned data ({tried} tried)")]
    NoSource { tried: usize },
}

impl GisError {
    /// Embedded service errors and bad URLs are not worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GisError::Status { .. } | GisError::Transport(_) | GisError::Json { .. }
        )
    }
}
