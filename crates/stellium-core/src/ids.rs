//! Prefixed entity ID generation.
//!
//! IDs are `{prefix}{10 lowercase hex chars}`, e.g. `chart_a3f8b2c1d4`.
//! Generated from the OS RNG rather than in SQL so the file tier can mint
//! IDs with no database present.

use crate::errors::CoreError;

/// ID prefix for charts.
pub const PREFIX_CHART: &str = "chart_";
/// ID prefix for rectifications.
pub const PREFIX_RECTIFICATION: &str = "rect_";
/// ID prefix for comparisons.
pub const PREFIX_COMPARISON: &str = "comp_";
/// ID prefix for exports.
pub const PREFIX_EXPORT: &str = "export_";

/// All known prefixes, for validation and tests.
pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_CHART,
    PREFIX_RECTIFICATION,
    PREFIX_COMPARISON,
    PREFIX_EXPORT,
];

/// Number of random bytes per ID (10 hex chars).
const ID_RANDOM_BYTES: usize = 5;

/// Generate a prefixed ID, e.g. `"chart_a3f8b2c1d4"`.
///
/// # Errors
///
/// Returns `CoreError::Rng` if the OS random source fails.
pub fn new_id(prefix: &str) -> Result<String, CoreError> {
    use std::fmt::Write;

    let mut bytes = [0u8; ID_RANDOM_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| CoreError::Rng(e.to_string()))?;

    let mut id = String::with_capacity(prefix.len() + ID_RANDOM_BYTES * 2);
    id.push_str(prefix);
    for b in bytes {
        // Write into a String cannot fail.
        let _ = write!(id, "{b:02x}");
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_id_correct_format() {
        let id = new_id(PREFIX_CHART).unwrap();
        assert!(id.starts_with("chart_"), "ID should start with 'chart_': {id}");
        assert_eq!(
            id.len(),
            PREFIX_CHART.len() + 10,
            "ID should be prefix + 10 hex chars: {id}"
        );

        let hex_part = &id[PREFIX_CHART.len()..];
        assert!(
            hex_part.chars().all(|c| c.is_ascii_hexdigit()),
            "Random part should be hex: {hex_part}"
        );
    }

    #[test]
    fn new_id_all_prefixes() {
        for prefix in ALL_PREFIXES {
            let id = new_id(prefix).unwrap();
            assert!(id.starts_with(prefix));
        }
    }

    #[test]
    fn new_id_uniqueness() {
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let id = new_id(PREFIX_EXPORT).unwrap();
            assert!(ids.insert(id.clone()), "Duplicate ID generated: {id}");
        }
    }
}
