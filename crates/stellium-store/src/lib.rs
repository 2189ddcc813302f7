//! # stellium-store
//!
//! Dual-tier entity persistence for Stellium: charts, rectifications,
//! comparisons, and exports.
//!
//! Every document lives in one of two tiers — a libSQL relational backend
//! (tables, foreign keys) or a filesystem JSON fallback — and callers never
//! see which. The relational tier is preferred when it is reachable and the
//! document's references resolve there; every availability failure (pool
//! unreachable, referential veto, query error) routes the operation to the
//! file tier instead of surfacing. The only hard failures are schema defects
//! outside self-heal mode and malformed input.
//!
//! Backend bootstrap is single-flight: the first operation (or an explicit
//! `ensure_initialized`/`ensure_schema` at startup) builds the pool and
//! ensures the schema exactly once, however many callers race it. Shutdown
//! cancels an in-flight bootstrap, drains background work, and closes the
//! pool with a bounded wait.

pub mod error;
pub mod files;
pub mod helpers;
pub mod locate;
pub mod repos;
pub mod selector;
pub mod service;

mod guard;
mod init;
mod pool;
mod schema;

#[cfg(test)]
mod test_support;

pub use error::StoreError;
pub use files::FileStore;
pub use locate::ChartLocator;
pub use selector::{BackendSelector, Tier};
pub use service::StelliumStore;
