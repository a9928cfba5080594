//! Aggregate output files.

use super::grid::aggregate_grid;
use super::hexbin::aggregate_hexbin;
use super::stats::Metric;
use crate::config::AggregateConfig;
use crate::model::{AggregateFile, AggregationCell, Binning, ParcelRecord};
use crate::pipeline::index::write_json_atomic;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// One written aggregate file.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenAggregate {
    pub path: PathBuf,
    pub metric: Metric,
    pub scheme: &'static str,
    pub cell_count: usize,
}

fn aggregate_file(metric: Metric, binning: Binning, cells: Vec<AggregationCell>) -> AggregateFile {
    AggregateFile {
        generated: chrono::Utc::now().to_rfc3339(),
        metric: metric.name().to_string(),
        binning,
        cell_count: cells.len(),
        cells,
    }
}

/// Recompute every (metric, scheme) pair from scratch and write
/// `<scheme>-<metric>.json` into `dir`. Metrics no parcel carries, and
/// schemes that produce no cells, are skipped.
pub fn write_aggregations(
    parcels: &[ParcelRecord],
    dir: &Path,
    params: &AggregateConfig,
) -> Result<Vec<WrittenAggregate>> {
    let mut written = Vec::new();

    for metric in Metric::ALL {
        if !parcels.iter().any(|p| metric.value(p).is_some()) {
            info!("no data for {metric}, skipping");
            continue;
        }

        let outputs = [
            (
                Binning::Hexbin {
                    hex_size_deg: params.hex_size_deg,
                },
                aggregate_hexbin(parcels, metric, params.hex_size_deg, params.reference_lat),
            ),
            (
                Binning::Grid {
                    grid_size_deg: params.grid_size_deg,
                },
                aggregate_grid(parcels, metric, params.grid_size_deg),
            ),
        ];

        for (binning, cells) in outputs {
            if cells.is_empty() {
                continue;
            }
            let scheme = binning.name();
            let path = dir.join(format!("{scheme}-{}.json", metric.name()));
            let file = aggregate_file(metric, binning, cells);
            write_json_atomic(&path, &file)?;
            info!("wrote {} ({} cells)", path.display(), file.cell_count);
            written.push(WrittenAggregate {
                path,
                metric,
                scheme,
                cell_count: file.cell_count,
            });
        }
    }

    Ok(written)
}
