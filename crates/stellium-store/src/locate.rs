//! Legacy chart lookup locations.
//!
//! Charts written by earlier process generations or alternate deployment
//! roots may live outside the primary data directory: in one of a small set
//! of configured legacy directories, or in a flat archive document mapping
//! chart IDs to chart documents. The locator probes a prioritized, finite
//! list built once from configuration — lookup never searches beyond it.
//!
//! All probes are read-only and tolerant: a missing or unparsable candidate
//! is skipped, never quarantined (these directories are not ours to mutate).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;

use stellium_config::StorageConfig;
use stellium_core::entities::Chart;

/// One candidate location for a legacy chart document.
#[derive(Debug, Clone)]
enum ChartLocation {
    /// A directory holding `{id}.json` documents.
    Dir(PathBuf),
    /// A single JSON object mapping chart IDs to chart documents.
    Archive(PathBuf),
}

/// Prioritized, bounded list of legacy chart locations.
#[derive(Debug, Clone)]
pub struct ChartLocator {
    locations: Vec<ChartLocation>,
}

impl ChartLocator {
    /// Build the probe list from configuration: each legacy directory in
    /// order, then the archive document (if configured).
    #[must_use]
    pub fn from_config(storage: &StorageConfig) -> Self {
        let mut locations: Vec<ChartLocation> = storage
            .legacy_chart_dirs
            .iter()
            .map(|dir| ChartLocation::Dir(PathBuf::from(dir)))
            .collect();
        if storage.has_archive() {
            locations.push(ChartLocation::Archive(PathBuf::from(&storage.archive_file)));
        }
        Self { locations }
    }

    /// Number of configured probe locations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether any legacy locations are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Probe each location in priority order; first hit wins.
    pub async fn find(&self, id: &str) -> Option<Chart> {
        for location in &self.locations {
            let found = match location {
                ChartLocation::Dir(dir) => probe_dir(dir, id).await,
                ChartLocation::Archive(path) => probe_archive(path, id).await,
            };
            if let Some(chart) = found {
                tracing::debug!(id, location = ?location, "Chart found in legacy location");
                return Some(chart);
            }
        }
        None
    }
}

async fn probe_dir(dir: &Path, id: &str) -> Option<Chart> {
    let path = dir.join(format!("{id}.json"));
    let raw = fs::read_to_string(&path).await.ok()?;
    match serde_json::from_str(&raw) {
        Ok(chart) => Some(chart),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unparsable legacy chart");
            None
        }
    }
}

async fn probe_archive(path: &Path, id: &str) -> Option<Chart> {
    let raw = fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<HashMap<String, Chart>>(&raw) {
        Ok(mut archive) => archive.remove(id),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Skipping unparsable chart archive");
            None
        }
    }
}
