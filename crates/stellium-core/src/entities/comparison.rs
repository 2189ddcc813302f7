use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A synastry comparison between two charts. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    pub id: String,
    pub chart1_id: String,
    pub chart2_id: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
