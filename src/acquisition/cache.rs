//! On-disk document cache: `<root>/<kind>/<key>.html`.
//!
//! A present, non-empty file means the document was fetched. Writes land
//! in a temporary sibling first and are renamed into place, so an entry is
//! either complete or absent.

use super::target::DocumentKind;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

/// File-name-safe form of a cache key: dashes and whitespace dropped,
/// anything outside `[A-Za-z0-9._]` replaced by `_`, and no leading dot.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.starts_with('.') {
        format!("_{cleaned}")
    } else {
        cleaned
    }
}

#[derive(Debug, Clone)]
pub struct DocumentCache {
    root: PathBuf,
}

impl DocumentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, kind: DocumentKind, key: &str) -> PathBuf {
        self.root
            .join(kind.tag())
            .join(format!("{}.html", sanitize_key(key)))
    }

    pub fn contains(&self, kind: DocumentKind, key: &str) -> bool {
        fs::metadata(self.path_for(kind, key))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Cached body, or `None` when absent, empty, or unreadable.
    pub fn read(&self, kind: DocumentKind, key: &str) -> Option<String> {
        let path = self.path_for(kind, key);
        match fs::read_to_string(&path) {
            Ok(body) if !body.is_empty() => Some(body),
            Ok(_) => None,
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                debug!("unreadable cache entry {}: {e}", path.display());
                None
            }
        }
    }

    pub fn write(&self, kind: DocumentKind, key: &str, body: &str) -> io::Result<PathBuf> {
        let path = self.path_for(kind, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("html.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}
