use serde::{Deserialize, Serialize};
use std::fmt;

use crate::enums::EntityKind;

/// A typed reference from one entity to another, used by the consistency
/// guard to decide whether a relational write is safe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    /// Reference a chart by ID.
    #[must_use]
    pub fn chart(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Chart,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}
