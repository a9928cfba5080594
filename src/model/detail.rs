//! Per-parcel history records and the detail file that holds them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One historical transfer of a parcel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    /// Grantee / fee owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buyer: Option<String>,
    /// Grantor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    /// Deed or instrument type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub deed_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_page: Option<String>,
}

impl SaleRecord {
    /// A row is meaningful when it has a date or a positive price.
    pub fn is_meaningful(&self) -> bool {
        self.date.is_some() || self.price.is_some_and(|p| p > 0)
    }
}

/// One construction or work permit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub permit_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PermitRecord {
    pub fn is_meaningful(&self) -> bool {
        self.number.as_deref().is_some_and(|s| !s.is_empty())
            || self.permit_type.as_deref().is_some_and(|s| !s.is_empty())
            || self.date.is_some()
    }
}

/// Improvement types treated as the parcel's primary dwelling.
pub const DWELLING_TYPES: &[&str] = &[
    "RESIDENCE",
    "DWELLING",
    "MULTI-FAMILY",
    "MANUFACTURED",
    "CONDO",
    "TOWNHOUSE",
];

/// One structure on a parcel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub structure_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqft: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat_class: Option<String>,
}

impl ImprovementRecord {
    pub fn is_dwelling(&self) -> bool {
        self.structure_type
            .as_deref()
            .map(|t| t.trim().to_uppercase())
            .is_some_and(|t| DWELLING_TYPES.contains(&t.as_str()))
    }
}

/// Contents of `sales/<identifier>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailFile {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub maptaxlot: String,
    #[serde(default)]
    pub sales: Vec<SaleRecord>,
    #[serde(default)]
    pub permits: Vec<PermitRecord>,
    #[serde(default)]
    pub improvements: Vec<ImprovementRecord>,
}

impl DetailFile {
    /// The identifier this file is stored under: the account, or the
    /// map/taxlot for parcels without one.
    pub fn identifier(&self) -> &str {
        if self.account.is_empty() {
            &self.maptaxlot
        } else {
            &self.account
        }
    }
}
