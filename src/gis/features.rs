//! Feature → parcel conversion for Esri JSON and GeoJSON query pages.
//!
//! Each service names its attributes differently, so every field is
//! looked up through an ordered list of candidate names.

use super::geometry::{centroid_from_geojson, centroid_from_rings};
use crate::config::LayerFormat;
use crate::model::ParcelRecord;
use serde::Deserialize;
use serde_json::{Map, Value};

const ESRI_TAXLOT_KEYS: &[&str] = &["MapTaxlot", "MAPLOT", "MAPTAXLOT", "TM_MAPLOT"];
const ESRI_ACCOUNT_KEYS: &[&str] = &["ACCOUNT", "ACCTNO", "ACCOUNT_ID", "AccountID", "Account"];
const ESRI_ADDRESS_KEYS: &[&str] = &[
    "SITEADD",
    "SITUS_ADDR",
    "SitusAddr",
    "ADDRESS",
    "SITUS",
    "PROP_ADDR",
    "FULLADDR",
];

const GEOJSON_TAXLOT_KEYS: &[&str] = &["MAPTAXLOT", "MapTaxlot", "MAP_TAXLOT"];
const GEOJSON_ACCOUNT_KEYS: &[&str] = &["ACCOUNT", "ACCTNO", "ACCOUNT_ID", "AccountID"];
const GEOJSON_ADDRESS_KEYS: &[&str] = &["SITUS_ADDR", "SitusAddr", "ADDRESS", "SITUS", "PROP_ADDR"];

/// One page of a layer query, in either output format.
#[derive(Debug, Default, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default, rename = "exceededTransferLimit")]
    pub exceeded_transfer_limit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Feature {
    /// Esri `attributes` or GeoJSON `properties`.
    #[serde(default, alias = "properties")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

/// A parcel as returned by a layer, before reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParcel {
    pub account: String,
    pub maptaxlot: String,
    pub address: String,
    /// `(lat, lng)` centroid.
    pub position: Option<(f64, f64)>,
    /// Every non-empty attribute the layer returned.
    pub attributes: Map<String, Value>,
}

impl RawParcel {
    /// Numeric attribute, accepting numbers or numeric strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.attributes.get(key).and_then(value_text)
    }

    pub fn into_parcel(self) -> ParcelRecord {
        ParcelRecord::seeded(self.account, self.maptaxlot, self.address, self.position)
    }
}

/// Trimmed text of a scalar attribute; empty, zero-like-null and
/// structured values are `None`.
fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            (None, Some(f)) => f.to_string(),
            _ => return None,
        },
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first_text(attrs: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| attrs.get(*k).and_then(value_text))
}

fn non_empty_attributes(attrs: Map<String, Value>) -> Map<String, Value> {
    attrs
        .into_iter()
        .filter(|(_, v)| match v {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
        .collect()
}

/// Esri JSON features. Features without a map/taxlot are skipped.
pub fn from_esri_json(page: QueryPage) -> Vec<RawParcel> {
    page.features
        .into_iter()
        .filter_map(|feature| {
            let attrs = feature.attributes.unwrap_or_default();
            let maptaxlot = first_text(&attrs, ESRI_TAXLOT_KEYS)?.replace('-', "");
            if maptaxlot.is_empty() {
                return None;
            }

            let account = ESRI_ACCOUNT_KEYS
                .iter()
                .find_map(|k| attrs.get(*k).and_then(value_text).filter(|v| v != "0"))
                .unwrap_or_default();
            let address = first_text(&attrs, ESRI_ADDRESS_KEYS).unwrap_or_default();
            let position = feature
                .geometry
                .as_ref()
                .and_then(|g| g.get("rings"))
                .and_then(centroid_from_rings);

            Some(RawParcel {
                account,
                maptaxlot,
                address,
                position,
                attributes: non_empty_attributes(attrs),
            })
        })
        .collect()
}

/// GeoJSON features. Features with neither map/taxlot nor account are
/// skipped.
pub fn from_geojson(page: QueryPage) -> Vec<RawParcel> {
    page.features
        .into_iter()
        .filter_map(|feature| {
            let attrs = feature.attributes.unwrap_or_default();
            let maptaxlot = first_text(&attrs, GEOJSON_TAXLOT_KEYS).unwrap_or_default();
            let account = first_text(&attrs, GEOJSON_ACCOUNT_KEYS).unwrap_or_default();
            if maptaxlot.is_empty() && account.is_empty() {
                return None;
            }

            let address = first_text(&attrs, GEOJSON_ADDRESS_KEYS).unwrap_or_default();
            let position = feature.geometry.as_ref().and_then(centroid_from_geojson);

            Some(RawParcel {
                account,
                maptaxlot,
                address,
                position,
                attributes: non_empty_attributes(attrs),
            })
        })
        .collect()
}

pub fn parse_page(format: LayerFormat, page: QueryPage) -> Vec<RawParcel> {
    match format {
        LayerFormat::Json => from_esri_json(page),
        LayerFormat::Geojson => from_geojson(page),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(value: Value) -> QueryPage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_esri_field_fallbacks() {
        let data = page(json!({
            "exceededTransferLimit": true,
            "features": [
                {
                    "attributes": {"MAPLOT": "391E-04DB-1400", "ACCOUNT": 0, "ACCTNO": "10012345",
                                   "SITEADD": " 123 MAIN ST ", "OWNER": ""},
                    "geometry": {"rings": [[[-122.70, 42.19], [-122.69, 42.20]]]}
                },
                {"attributes": {"ACCOUNT": "10099999"}},
                {"attributes": {"TM_MAPLOT": "391E04DB1500", "ACCOUNT": "0"}}
            ]
        }));
        assert_eq!(data.exceeded_transfer_limit, Some(true));

        let parcels = from_esri_json(data);
        assert_eq!(parcels.len(), 2);

        let first = &parcels[0];
        assert_eq!(first.maptaxlot, "391E04DB1400");
        assert_eq!(first.account, "10012345");
        assert_eq!(first.address, "123 MAIN ST");
        assert_eq!(first.position, Some((42.195, -122.695)));
        assert!(!first.attributes.contains_key("OWNER"));

        assert_eq!(parcels[1].account, "");
        assert_eq!(parcels[1].position, None);
    }

    #[test]
    fn test_geojson_fields() {
        let data = page(json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"MAP_TAXLOT": "391E04DB01400", "SitusAddr": "1 OAK ST"},
                    "geometry": {"type": "Point", "coordinates": [-122.7, 42.19]}
                },
                {"type": "Feature", "properties": {"ACCOUNT_ID": 10055555}, "geometry": null},
                {"type": "Feature", "properties": {"NAME": "park"}, "geometry": null},
                {"type": "Feature", "properties": null}
            ]
        }));
        let parcels = from_geojson(data);
        assert_eq!(parcels.len(), 2);
        assert_eq!(parcels[0].maptaxlot, "391E04DB01400");
        assert_eq!(parcels[0].address, "1 OAK ST");
        assert_eq!(parcels[0].position, Some((42.19, -122.7)));
        assert_eq!(parcels[1].account, "10055555");
        assert_eq!(parcels[1].maptaxlot, "");
    }

    #[test]
    fn test_numeric_attributes() {
        let parcel = RawParcel {
            attributes: json!({"YEARBLT": 1995, "ACREAGE": "0.17", "FEEOWNER": "SMITH"})
                .as_object()
                .cloned()
                .unwrap(),
            ..Default::default()
        };
        assert_eq!(parcel.number("YEARBLT"), Some(1995.0));
        assert_eq!(parcel.number("ACREAGE"), Some(0.17));
        assert_eq!(parcel.number("FEEOWNER"), None);
        assert_eq!(parcel.text("FEEOWNER").as_deref(), Some("SMITH"));
        assert_eq!(parcel.number("MISSING"), None);
    }
}
