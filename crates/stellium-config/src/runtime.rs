//! Runtime behavior configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Allow the schema manager to add missing columns it finds on an
    /// existing table. Intended for test deployments; in normal mode a
    /// missing table or column after bootstrap is a fatal deployment defect.
    #[serde(default)]
    pub schema_self_heal: bool,
}
