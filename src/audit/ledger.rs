//! JSONL fetch ledger: one line per live request attempt.
//!
//! Cache hits are not recorded; the cache itself is the record of work
//! done. The ledger answers "what did we ask the county for, and how did
//! it go" across runs.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

/// A single live fetch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchEvent {
    pub timestamp: String,
    /// Document kind tag (`sales`, `detail`, `permit`).
    pub kind: String,
    /// Cache key the attempt was made for.
    pub key: String,
    pub url: String,
    /// 1-based attempt number.
    pub attempt: u32,
    /// `ok`, `not_found` or `error`.
    pub status: String,
    pub http_status: Option<u16>,
    pub bytes: Option<usize>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchEvent {
    pub fn new(kind: &str, key: &str, url: &str, attempt: u32) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: kind.to_string(),
            key: key.to_string(),
            url: url.to_string(),
            attempt,
            status: String::new(),
            http_status: None,
            bytes: None,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Append-only JSONL ledger, safe to share between tasks.
pub struct FetchLedger {
    file: Mutex<File>,
}

impl FetchLedger {
    /// Open or create the ledger file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open fetch ledger: {}", path.display()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn record(&self, event: &FetchEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("fetch ledger lock poisoned"))?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

/// Attempt counts per kind and status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub attempts: usize,
    /// kind → status → count.
    pub by_kind: BTreeMap<String, BTreeMap<String, usize>>,
    pub last_timestamp: Option<String>,
}

impl LedgerSummary {
    /// Summarize a ledger file. A missing file is an empty summary;
    /// unparseable lines are skipped.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut summary = Self::default();
        if !path.exists() {
            return Ok(summary);
        }

        let file = File::open(path)
            .with_context(|| format!("failed to read fetch ledger: {}", path.display()))?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let Ok(event) = serde_json::from_str::<FetchEvent>(&line) else {
                continue;
            };
            summary.attempts += 1;
            *summary
                .by_kind
                .entry(event.kind)
                .or_default()
                .entry(event.status)
                .or_default() += 1;
            summary.last_timestamp = Some(event.timestamp);
        }
        Ok(summary)
    }
}
