use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::RectificationStatus;

/// A birth-time rectification run. References the rectified chart and the
/// original chart it was derived from. Created once per run; status moves
/// `pending → completed` or `pending → failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rectification {
    pub id: String,
    pub chart_id: String,
    pub original_chart_id: String,
    pub payload: serde_json::Value,
    pub status: RectificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
