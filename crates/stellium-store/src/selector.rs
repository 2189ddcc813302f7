//! Per-operation storage tier selection.
//!
//! Centralizes the fallback rule instead of scattering pool checks across
//! repo methods: no live relational connection means the file tier; a
//! referential veto from the consistency guard also means the file tier.
//! The decision is explicit and testable in isolation.

use stellium_core::entities::EntityRef;

use crate::guard;

/// The storage tier chosen for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Relational,
    File,
}

/// Strategy object deciding the tier for each write.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendSelector;

impl BackendSelector {
    /// Decide where a write referencing `refs` goes.
    ///
    /// `conn` is `None` when no relational backend is live — everything goes
    /// to the file tier. With a live connection, the write stays relational
    /// unless the consistency guard vetoes it.
    pub(crate) async fn tier_for_write(
        self,
        conn: Option<&libsql::Connection>,
        refs: &[EntityRef],
    ) -> Tier {
        let Some(conn) = conn else {
            return Tier::File;
        };
        if refs.is_empty() || guard::can_write_relational(conn, refs).await {
            Tier::Relational
        } else {
            Tier::File
        }
    }
}
