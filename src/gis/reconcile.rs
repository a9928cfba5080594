//! Seed selection, enrichment merge and region filtering.

use super::arcgis::{ArcGisClient, LayerQuery};
use super::features::RawParcel;
use super::maptaxlot::normalize;
use crate::config::{BoundingBox, GisConfig, PipelineConfig};
use crate::error::GisError;
use crate::model::ParcelRecord;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{info, warn};

const SQFT_PER_ACRE: f64 = 43560.0;

/// Attributes requested from the enrichment layer.
pub const ENRICHMENT_FIELDS: &[&str] = &[
    "MAPLOT",
    "ACCOUNT",
    "SITEADD",
    "YEARBLT",
    "IMPVALUE",
    "LANDVALUE",
    "ACREAGE",
];

/// Account-bearing attributes for one map/taxlot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentRecord {
    /// Normalized map/taxlot.
    pub maptaxlot: String,
    /// Map/taxlot as the layer returned it.
    pub raw_maptaxlot: String,
    pub account: String,
    pub address: String,
    pub year_built: Option<i32>,
    pub assessed_value: Option<u64>,
    pub sqft_lot: Option<u64>,
    pub position: Option<(f64, f64)>,
}

impl EnrichmentRecord {
    /// `None` when the parcel has no map/taxlot or no usable account.
    pub fn from_raw(raw: &RawParcel) -> Option<Self> {
        if raw.maptaxlot.is_empty() {
            return None;
        }
        let account = raw.text("ACCOUNT").filter(|a| a != "0")?;

        let improvements = raw.number("IMPVALUE").unwrap_or(0.0);
        let land = raw.number("LANDVALUE").unwrap_or(0.0);
        let acreage = raw.number("ACREAGE").unwrap_or(0.0);
        let assessed = improvements + land;

        Some(Self {
            maptaxlot: normalize(&raw.maptaxlot),
            raw_maptaxlot: raw.maptaxlot.clone(),
            account,
            address: raw.text("SITEADD").unwrap_or_default(),
            year_built: raw
                .number("YEARBLT")
                .filter(|y| *y > 0.0)
                .map(|y| y as i32),
            assessed_value: (assessed > 0.0).then(|| assessed as u64),
            sqft_lot: (acreage > 0.0).then(|| (acreage * SQFT_PER_ACRE).round() as u64),
            position: raw.position,
        })
    }

    fn to_parcel(&self) -> ParcelRecord {
        let mut parcel = ParcelRecord::seeded(
            self.account.clone(),
            self.maptaxlot.clone(),
            self.address.clone(),
            self.position,
        );
        parcel.year_built = self.year_built;
        parcel.assessed_value = self.assessed_value;
        parcel.sqft_lot = self.sqft_lot;
        parcel
    }
}

/// Enrichment records reachable by normalized or raw map/taxlot.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentIndex {
    records: Vec<EnrichmentRecord>,
    by_key: HashMap<String, usize>,
}

impl EnrichmentIndex {
    /// Index layer output. A later record for an already-seen normalized
    /// map/taxlot replaces the earlier one in place.
    pub fn from_raw(parcels: &[RawParcel]) -> Self {
        let mut index = Self::default();
        for record in parcels.iter().filter_map(EnrichmentRecord::from_raw) {
            index.insert(record);
        }
        index
    }

    pub fn insert(&mut self, record: EnrichmentRecord) {
        let slot = match self.by_key.get(&record.maptaxlot) {
            Some(&idx) => {
                self.records[idx] = record;
                idx
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        };
        let record = &self.records[slot];
        self.by_key.insert(record.maptaxlot.clone(), slot);
        self.by_key.insert(record.raw_maptaxlot.clone(), slot);
    }

    pub fn get(&self, key: &str) -> Option<&EnrichmentRecord> {
        self.by_key.get(key).map(|&idx| &self.records[idx])
    }

    /// Raw identifier first, then its normalized form.
    pub fn lookup(&self, maptaxlot: &str) -> Option<&EnrichmentRecord> {
        if maptaxlot.is_empty() {
            return None;
        }
        self.get(maptaxlot)
            .or_else(|| self.get(&normalize(maptaxlot)))
    }

    pub fn records(&self) -> &[EnrichmentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Outcome of an enrichment merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichReport {
    /// Existing parcels that found an enrichment record.
    pub matched: usize,
    /// Enrichment records appended as new parcels.
    pub added: usize,
    /// Accounts carried by more than one parcel after the merge.
    pub duplicate_accounts: Vec<String>,
}

/// Merge enrichment into `parcels`.
///
/// Only populated enrichment fields overwrite; a position is only filled
/// when the parcel has none. Enrichment records with no matching parcel
/// are appended. Parcels sharing an account are reported, not dropped.
pub fn enrich(parcels: &mut Vec<ParcelRecord>, index: &EnrichmentIndex) -> EnrichReport {
    let mut report = EnrichReport::default();
    let mut seen: HashSet<String> = HashSet::new();

    for parcel in parcels.iter_mut() {
        if parcel.maptaxlot.is_empty() {
            continue;
        }
        seen.insert(parcel.maptaxlot.clone());
        seen.insert(normalize(&parcel.maptaxlot));

        let Some(record) = index.lookup(&parcel.maptaxlot) else {
            continue;
        };
        report.matched += 1;

        if !record.account.is_empty() {
            parcel.account = record.account.clone();
        }
        if !record.address.is_empty() {
            parcel.address = record.address.clone();
        }
        if record.year_built.is_some() {
            parcel.year_built = record.year_built;
        }
        if record.assessed_value.is_some() {
            parcel.assessed_value = record.assessed_value;
        }
        if record.sqft_lot.is_some() {
            parcel.sqft_lot = record.sqft_lot;
        }
        if parcel.position().is_none() {
            if let Some((lat, lng)) = record.position {
                parcel.lat = Some(lat);
                parcel.lng = Some(lng);
            }
        }
    }

    for record in index.records() {
        if seen.contains(&record.maptaxlot) || seen.contains(&record.raw_maptaxlot) {
            continue;
        }
        seen.insert(record.maptaxlot.clone());
        parcels.push(record.to_parcel());
        report.added += 1;
    }

    report.duplicate_accounts = duplicate_accounts(parcels);
    if !report.duplicate_accounts.is_empty() {
        warn!(
            "{} accounts appear on more than one parcel (e.g. {})",
            report.duplicate_accounts.len(),
            report.duplicate_accounts[0]
        );
    }
    info!(
        "enrichment: matched {} existing parcels, added {} new",
        report.matched, report.added
    );
    report
}

fn duplicate_accounts(parcels: &[ParcelRecord]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for parcel in parcels.iter().filter(|p| !p.account.is_empty()) {
        *counts.entry(parcel.account.as_str()).or_default() += 1;
    }
    counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(account, _)| account.to_string())
        .collect()
}

/// Keep parcels whose map/taxlot starts with `prefix`. Parcels without a
/// map/taxlot are kept when their position falls inside `bbox`.
pub fn filter_region(
    parcels: Vec<ParcelRecord>,
    prefix: &str,
    bbox: &BoundingBox,
) -> Vec<ParcelRecord> {
    let total = parcels.len();
    let kept: Vec<ParcelRecord> = parcels
        .into_iter()
        .filter(|p| {
            if p.maptaxlot.is_empty() {
                p.position()
                    .is_some_and(|(lat, lng)| bbox.contains(lat, lng))
            } else {
                p.maptaxlot.starts_with(prefix)
            }
        })
        .collect();
    info!("region filter: kept {} of {total} parcels", kept.len());
    kept
}

/// Parcels from the first seed layer that returned any.
#[derive(Debug, Clone)]
pub struct SeedSet {
    /// Name of the layer that supplied the parcels.
    pub source: String,
    /// Parcels returned before the region filter.
    pub fetched: usize,
    pub parcels: Vec<ParcelRecord>,
}

/// Seed parcels plus enrichment, ready to be written as the index.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub seed: SeedSet,
    pub enrichment: EnrichReport,
    pub parcels: Vec<ParcelRecord>,
}

/// Drives the seed layers and the enrichment layer.
#[derive(Debug, Clone)]
pub struct Reconciler {
    client: ArcGisClient,
    gis: GisConfig,
}

impl Reconciler {
    pub fn new(client: ArcGisClient, config: &PipelineConfig) -> Self {
        Self {
            client,
            gis: config.gis.clone(),
        }
    }

    /// Try each seed layer in priority order; the first with any parcels
    /// wins and is filtered to the region.
    pub async fn fetch_seed(&self) -> Result<SeedSet, GisError> {
        for layer in &self.gis.seed_layers {
            info!("seed: trying {} ({})", layer.name, layer.url);
            let mut query = LayerQuery::prefix(&layer.taxlot_field, &self.gis.map_prefix);
            if self.gis.seed_envelope {
                query = query.with_envelope(self.gis.bbox);
            }
            let raw = self.client.fetch_all(layer, &query).await;
            if raw.is_empty() {
                warn!("seed: {} returned no parcels", layer.name);
                continue;
            }

            let fetched = raw.len();
            let parcels: Vec<ParcelRecord> = raw.into_iter().map(RawParcel::into_parcel).collect();
            let parcels = filter_region(parcels, &self.gis.map_prefix, &self.gis.bbox);
            info!("seed: {fetched} parcels from {}", layer.name);
            return Ok(SeedSet {
                source: layer.name.clone(),
                fetched,
                parcels,
            });
        }

        Err(GisError::NoSource {
            tried: self.gis.seed_layers.len(),
        })
    }

    /// Account-bearing records from the enrichment layer. An unreachable
    /// layer yields an empty index.
    pub async fn fetch_enrichment(&self) -> EnrichmentIndex {
        let layer = &self.gis.enrichment_layer;
        let query = LayerQuery::new(format!(
            "ACCOUNT IS NOT NULL AND {} LIKE '{}%'",
            layer.taxlot_field, self.gis.map_prefix
        ))
        .with_fields(ENRICHMENT_FIELDS);

        let raw = self.client.fetch_all(layer, &query).await;
        let index = EnrichmentIndex::from_raw(&raw);
        info!("enrichment: {} records with account data", index.len());
        index
    }

    /// Seed, enrich, and return the merged parcel set.
    pub async fn reconcile(&self) -> Result<Reconciled, GisError> {
        let seed = self.fetch_seed().await?;
        let index = self.fetch_enrichment().await;
        let mut parcels = seed.parcels.clone();
        let enrichment = enrich(&mut parcels, &index);
        Ok(Reconciled {
            seed,
            enrichment,
            parcels,
        })
    }
}
