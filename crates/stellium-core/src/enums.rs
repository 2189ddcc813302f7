//! Entity kinds, status enums, and export formats for Stellium.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.
//! Status enums with state machines provide `allowed_next_states()` to enforce
//! valid transitions at the application layer.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// The four persisted document kinds.
///
/// Each kind maps to one SQL table and one per-kind directory in the file
/// tier. The mapping is an exhaustive match — adding a variant forces
/// updating every site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Chart,
    Rectification,
    Comparison,
    Export,
}

impl EntityKind {
    /// The SQL table holding this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Chart => "charts",
            Self::Rectification => "rectifications",
            Self::Comparison => "comparisons",
            Self::Export => "exports",
        }
    }

    /// The file-tier subdirectory holding this kind's documents.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        // Same plural as the table name; one JSON document per entity.
        self.table()
    }

    /// The ID prefix for this kind (e.g., `chart_` for charts).
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::Chart => crate::ids::PREFIX_CHART,
            Self::Rectification => crate::ids::PREFIX_RECTIFICATION,
            Self::Comparison => crate::ids::PREFIX_COMPARISON,
            Self::Export => crate::ids::PREFIX_EXPORT,
        }
    }

    /// Return the string representation used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chart => "chart",
            Self::Rectification => "rectification",
            Self::Comparison => "comparison",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RectificationStatus
// ---------------------------------------------------------------------------

/// Status of a birth-time rectification run.
///
/// ```text
/// pending → completed
///         → failed
/// ```
///
/// `failed` is surfaced, not retried — retry policy belongs to the calling
/// workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RectificationStatus {
    Pending,
    Completed,
    Failed,
}

impl RectificationStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Whether a transition to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RectificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExportFormat
// ---------------------------------------------------------------------------

/// Rendered output format of a chart export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Pdf,
    Png,
    Svg,
}

impl ExportFormat {
    /// Return the string representation used in SQL storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entity_kind_tables_and_prefixes() {
        assert_eq!(EntityKind::Chart.table(), "charts");
        assert_eq!(EntityKind::Rectification.table(), "rectifications");
        assert_eq!(EntityKind::Comparison.id_prefix(), "comp_");
        assert_eq!(EntityKind::Export.dir_name(), "exports");
    }

    #[test]
    fn rectification_status_transitions() {
        assert!(RectificationStatus::Pending.can_transition_to(RectificationStatus::Completed));
        assert!(RectificationStatus::Pending.can_transition_to(RectificationStatus::Failed));
        assert!(!RectificationStatus::Completed.can_transition_to(RectificationStatus::Pending));
        assert!(!RectificationStatus::Failed.can_transition_to(RectificationStatus::Completed));
        assert!(RectificationStatus::Completed.allowed_next_states().is_empty());
    }

    #[test]
    fn snake_case_serialization() {
        assert_eq!(
            serde_json::to_string(&RectificationStatus::Pending).unwrap(),
            "\"pending\""
        );
        assert_eq!(serde_json::to_string(&ExportFormat::Pdf).unwrap(), "\"pdf\"");
        assert_eq!(
            serde_json::from_str::<EntityKind>("\"chart\"").unwrap(),
            EntityKind::Chart
        );
    }
}
