use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::ExportFormat;

/// A rendered chart export (PDF/PNG/SVG on disk, served via a download URL).
///
/// `expires_at` is a hard read boundary: reads after expiry report the export
/// as not available even though the underlying document still exists.
/// `download_count` is the only field mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Export {
    pub id: String,
    pub chart_id: String,
    pub file_path: String,
    pub format: ExportFormat,
    pub download_url: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub download_count: u64,
}

/// Caller-supplied fields for a new export; the store stamps `generated_at`
/// and zeroes `download_count`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewExport {
    pub chart_id: String,
    pub file_path: String,
    pub format: ExportFormat,
    pub download_url: Option<String>,
    pub expires_at: DateTime<Utc>,
}
