//! File-tier storage configuration.

use serde::{Deserialize, Serialize};

/// Default file-tier root directory.
fn default_data_dir() -> String {
    ".stellium/data".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for per-kind document subdirectories
    /// (`{data_dir}/charts/`, `{data_dir}/exports/`, ...).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Additional directories probed (in order) when a chart is not found in
    /// the primary location — documents written by earlier process
    /// generations or alternate deployment roots. The list is finite and
    /// explicit; lookup never searches beyond it.
    #[serde(default)]
    pub legacy_chart_dirs: Vec<String>,

    /// Optional flat archive document: a single JSON object mapping chart IDs
    /// to chart documents. Probed last. Empty disables the probe.
    #[serde(default)]
    pub archive_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            legacy_chart_dirs: Vec::new(),
            archive_file: String::new(),
        }
    }
}

impl StorageConfig {
    /// Whether a flat archive document is configured.
    #[must_use]
    pub fn has_archive(&self) -> bool {
        !self.archive_file.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        let config = StorageConfig::default();
        assert_eq!(config.data_dir, ".stellium/data");
        assert!(config.legacy_chart_dirs.is_empty());
        assert!(!config.has_archive());
    }
}
