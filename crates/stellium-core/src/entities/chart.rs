use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A natal chart document: planets, houses, and angles as computed by the
/// calculation layer. Read-mostly; may be deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chart {
    pub id: String,
    /// Opaque calculation output (planets/houses/angles). The persistence
    /// layer never inspects it.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
