//! Cross-cutting error types for Stellium.
//!
//! Domain-specific errors (e.g., `StoreError`, `ConfigError`) are defined in
//! their respective crates. This module holds errors that can originate from
//! the core types themselves.

use thiserror::Error;

/// Errors raised by core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The operating system's random number source failed.
    ///
    /// ID generation depends on it; there is no meaningful fallback.
    #[error("System RNG unavailable: {0}")]
    Rng(String),

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
