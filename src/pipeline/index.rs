//! `parcels.json` load/save and atomic JSON writes.

use crate::model::{ParcelIndex, ParcelRecord};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Pretty-print `value` to `path` via a sibling temp file and rename, so
/// readers never observe a half-written file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load the parcel index. The stored `count` is ignored in favour of the
/// actual list length.
pub fn load_index(path: &Path) -> Result<ParcelIndex> {
    let mut index: ParcelIndex = read_json(path)?;
    index.count = index.parcels.len();
    Ok(index)
}

/// Write the index with a fresh timestamp and a `count` matching the list.
pub fn save_index(path: &Path, parcels: &[ParcelRecord]) -> Result<()> {
    let index = ParcelIndex::new(parcels.to_vec());
    write_json_atomic(path, &index)
}
