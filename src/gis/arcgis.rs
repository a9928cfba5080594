//! ArcGIS REST layer queries with pagination.

use super::features::{parse_page, QueryPage, RawParcel};
use crate::acquisition::{HttpClient, RetryPolicy};
use crate::config::{BoundingBox, LayerConfig, PipelineConfig};
use crate::error::GisError;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Filter and field selection for a layer query.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerQuery {
    pub where_clause: String,
    pub out_fields: String,
    /// Optional spatial filter, in WGS84.
    pub envelope: Option<BoundingBox>,
}

impl LayerQuery {
    /// All fields of features matching `where_clause`.
    pub fn new(where_clause: impl Into<String>) -> Self {
        Self {
            where_clause: where_clause.into(),
            out_fields: "*".to_string(),
            envelope: None,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.out_fields = fields.join(",");
        self
    }

    pub fn with_envelope(mut self, bbox: BoundingBox) -> Self {
        self.envelope = Some(bbox);
        self
    }

    /// `<field> LIKE '<prefix>%'`
    pub fn prefix(field: &str, prefix: &str) -> Self {
        Self::new(format!("{field} LIKE '{prefix}%'"))
    }
}

/// Client for paginated feature queries.
#[derive(Debug, Clone)]
pub struct ArcGisClient {
    http: HttpClient,
    retry: RetryPolicy,
    page_delay: Duration,
}

impl ArcGisClient {
    pub fn new(http: HttpClient, config: &PipelineConfig) -> Self {
        Self {
            http,
            retry: RetryPolicy::from_config(&config.http),
            page_delay: Duration::from_millis(config.gis.page_delay_ms),
        }
    }

    /// `<layer>/query` with every query parameter for one page.
    pub fn query_url(
        &self,
        layer: &LayerConfig,
        query: &LayerQuery,
        offset: usize,
    ) -> Result<Url, GisError> {
        let mut url = Url::parse(&format!("{}/query", layer.url.trim_end_matches('/')))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("where", &query.where_clause)
                .append_pair("outFields", &query.out_fields)
                .append_pair("returnGeometry", "true")
                .append_pair("outSR", "4326")
                .append_pair("f", layer.format.as_param())
                .append_pair("resultOffset", &offset.to_string())
                .append_pair("resultRecordCount", &layer.page_size.to_string());
            if let Some(bbox) = query.envelope {
                let envelope = serde_json::json!({
                    "xmin": bbox.xmin,
                    "ymin": bbox.ymin,
                    "xmax": bbox.xmax,
                    "ymax": bbox.ymax,
                });
                pairs
                    .append_pair("geometry", &envelope.to_string())
                    .append_pair("geometryType", "esriGeometryEnvelope")
                    .append_pair("inSR", "4326")
                    .append_pair("spatialRel", "esriSpatialRelIntersects");
            }
        }
        Ok(url)
    }

    /// One page, retried with backoff. An embedded `"error"` object is a
    /// terminal failure.
    pub async fn query_page(
        &self,
        layer: &LayerConfig,
        query: &LayerQuery,
        offset: usize,
    ) -> Result<QueryPage, GisError> {
        let url = self.query_url(layer, query, offset)?;
        let what = format!("{} offset={offset}", layer.name);
        self.retry.run(&what, |_| self.request_page(&url)).await
    }

    async fn request_page(&self, url: &Url) -> Result<QueryPage, GisError> {
        let resp = self.http.get(url).await?;
        if !resp.is_success() {
            return Err(GisError::Status {
                status: resp.status,
                url: resp.url,
            });
        }

        let value: Value = serde_json::from_str(&resp.body).map_err(|source| GisError::Json {
            url: resp.url.clone(),
            source,
        })?;
        if let Some(err) = value.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(GisError::Service {
                url: resp.url,
                message,
            });
        }

        serde_json::from_value(value).map_err(|source| GisError::Json {
            url: resp.url,
            source,
        })
    }

    /// Every parcel the layer returns for `query`.
    ///
    /// Stops at the first failed page (keeping what came before), a page
    /// with no usable parcels, a short page, or when the server reports
    /// the transfer limit was not exceeded.
    pub async fn fetch_all(&self, layer: &LayerConfig, query: &LayerQuery) -> Vec<RawParcel> {
        let mut parcels = Vec::new();
        let mut offset = 0;

        loop {
            debug!("{}: fetching offset={offset}", layer.name);
            let page = match self.query_page(layer, query, offset).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("{}: stopping at offset={offset}: {e}", layer.name);
                    break;
                }
            };

            let returned = page.features.len();
            let exceeded = page.exceeded_transfer_limit;
            let batch = parse_page(layer.format, page);
            if batch.is_empty() {
                break;
            }
            parcels.extend(batch);
            info!("{}: {} parcels so far", layer.name, parcels.len());

            if returned < layer.page_size || exceeded == Some(false) {
                break;
            }

            offset += layer.page_size;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        parcels
    }
}
