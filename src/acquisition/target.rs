//! What gets fetched: document kinds and per-parcel targets.

use crate::model::ParcelRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three per-account pages on the records site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Sales,
    Detail,
    Permit,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [DocumentKind::Sales, DocumentKind::Detail, DocumentKind::Permit];

    /// Endpoint path under the site base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DocumentKind::Sales => "sales.cfm",
            DocumentKind::Detail => "Ora_asmt_details.cfm",
            DocumentKind::Permit => "permit.cfm",
        }
    }

    /// Tag used for cache directories and the ledger.
    pub fn tag(&self) -> &'static str {
        match self {
            DocumentKind::Sales => "sales",
            DocumentKind::Detail => "detail",
            DocumentKind::Permit => "permit",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag().eq_ignore_ascii_case(tag.trim()))
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parcel as seen by the fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTarget {
    pub account: String,
    pub maptaxlot: String,
}

impl FetchTarget {
    pub fn new(account: impl Into<String>, maptaxlot: impl Into<String>) -> Self {
        Self {
            account: account.into().trim().to_string(),
            maptaxlot: maptaxlot.into().trim().to_string(),
        }
    }

    pub fn from_parcel(parcel: &ParcelRecord) -> Self {
        Self::new(parcel.account.as_str(), parcel.maptaxlot.as_str())
    }

    /// Account if present, else map/taxlot. `None` means nothing to fetch.
    pub fn cache_key(&self) -> Option<&str> {
        if !self.account.is_empty() {
            Some(&self.account)
        } else if !self.maptaxlot.is_empty() {
            Some(&self.maptaxlot)
        } else {
            None
        }
    }

    /// Query parameter identifying this parcel to the records site.
    pub fn query(&self) -> Option<(&'static str, String)> {
        if !self.account.is_empty() {
            let digits: String = self.account.chars().filter(|c| c.is_ascii_digit()).collect();
            Some(("account", digits))
        } else if !self.maptaxlot.is_empty() {
            Some(("maptaxlot", self.maptaxlot.clone()))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_preferred() {
        let t = FetchTarget::new("1-0012345", "391E04DB01400");
        assert_eq!(t.cache_key(), Some("1-0012345"));
        assert_eq!(t.query(), Some(("account", "10012345".to_string())));
    }

    #[test]
    fn test_maptaxlot_fallback() {
        let t = FetchTarget::new("  ", "391E04DB01400");
        assert_eq!(t.cache_key(), Some("391E04DB01400"));
        assert_eq!(t.query(), Some(("maptaxlot", "391E04DB01400".to_string())));
    }

    #[test]
    fn test_no_identifier() {
        let t = FetchTarget::default();
        assert_eq!(t.cache_key(), None);
        assert_eq!(t.query(), None);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(DocumentKind::Detail.endpoint(), "Ora_asmt_details.cfm");
        assert_eq!(DocumentKind::parse("Permit"), Some(DocumentKind::Permit));
        assert_eq!(DocumentKind::parse("deeds"), None);
        assert_eq!(DocumentKind::Sales.to_string(), "sales");
    }
}
