//! # stellium-core
//!
//! Core types, ID generation, and error types for Stellium.
//!
//! This crate provides the foundational types shared across all Stellium crates:
//! - Entity structs for the four persisted document kinds (charts,
//!   rectifications, comparisons, exports)
//! - Status enums with state machine transitions
//! - Entity kind / reference types used by the storage tier router
//! - ID prefix constants and generation helpers
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
