//! Per-parcel detail files under `sales/`.

use super::index::write_json_atomic;
use crate::extraction::ParsedAccount;
use crate::model::{DetailFile, ParcelRecord};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Whether `identifier` can be used verbatim as a file stem in `dir`.
pub fn is_file_safe(identifier: &str) -> bool {
    !identifier.is_empty()
        && !identifier.starts_with('.')
        && !identifier.contains(['/', '\\', '\0'])
}

pub fn detail_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{identifier}.json"))
}

/// Detail file contents for a parcel's parsed pages.
pub fn detail_from_parsed(parcel: &ParcelRecord, parsed: &ParsedAccount) -> DetailFile {
    DetailFile {
        account: parcel.account.clone(),
        maptaxlot: parcel.maptaxlot.clone(),
        sales: parsed.sales.clone(),
        permits: parsed.permits.clone(),
        improvements: parsed.improvements.clone(),
    }
}

/// Write `<dir>/<identifier>.json`. Returns `None`, writing nothing, when
/// the identifier is empty or not usable as a file name.
pub fn write_detail(dir: &Path, detail: &DetailFile) -> Result<Option<PathBuf>> {
    let identifier = detail.identifier();
    if identifier.is_empty() {
        return Ok(None);
    }
    if !is_file_safe(identifier) {
        warn!("skipping detail file for unsafe identifier {identifier:?}");
        return Ok(None);
    }
    let path = detail_path(dir, identifier);
    write_json_atomic(&path, detail)?;
    Ok(Some(path))
}

/// Identifiers (file stems) that already have a detail file. A missing
/// directory has none.
pub fn existing_identifiers(dir: &Path) -> Result<HashSet<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found = HashSet::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                found.insert(stem.to_string());
            }
        }
    }
    Ok(found)
}
