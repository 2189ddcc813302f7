//! Store error types for stellium-store.
//!
//! Only `Schema` (outside self-heal mode) and programmer errors
//! (`MissingField`, unserializable input, invalid status transitions) reach
//! callers of the public store surface. Availability conditions —
//! `Unavailable`, relational `Query`/`LibSql` failures — are absorbed into
//! the file-tier fallback. Absence is `Ok(None)`, never an error.

use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Relational backend unreachable or pool closed. Non-fatal: triggers
    /// file-tier fallback and never crosses the public store/get surface.
    #[error("Relational backend unavailable: {0}")]
    Unavailable(String),

    /// Required table or column missing outside self-heal mode. Fatal —
    /// indicates a deployment defect, not a transient condition.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// A required field was missing or empty on store.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A document could not be serialized or deserialized. On file reads
    /// this is handled internally by quarantining; it propagates only for
    /// unserializable inputs on write.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// File-tier I/O failure (disk, permissions). Not maskable by fallback.
    #[error("File storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Core-type error (ID generation, status transitions).
    #[error(transparent)]
    Core(#[from] stellium_core::errors::CoreError),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
