//! Repository modules implementing CRUD operations for all entity kinds.
//!
//! Each module adds methods to `StelliumStore` via `impl StelliumStore`
//! blocks. All of them follow the same dispatch protocol: ensure the backend
//! is bootstrapped, let the selector pick a tier for writes, try the
//! relational tier first for reads, and absorb every availability failure
//! into the file-tier fallback.

pub mod chart;
pub mod comparison;
pub mod export;
pub mod rectification;
