//! Rectification repository — CRUD plus status state machine.

use chrono::{DateTime, Utc};
use serde_json::Value;

use stellium_core::entities::{EntityRef, Rectification};
use stellium_core::enums::{EntityKind, RectificationStatus};
use stellium_core::errors::CoreError;
use stellium_core::ids;

use crate::error::StoreError;
use crate::helpers::{parse_datetime, parse_enum, parse_json};
use crate::pool::DbPool;
use crate::selector::Tier;
use crate::service::StelliumStore;

fn row_to_rectification(row: &libsql::Row) -> Result<Rectification, StoreError> {
    Ok(Rectification {
        id: row.get::<String>(0)?,
        chart_id: row.get::<String>(1)?,
        original_chart_id: row.get::<String>(2)?,
        payload: parse_json(&row.get::<String>(3)?)?,
        status: parse_enum(&row.get::<String>(4)?)?,
        created_at: parse_datetime(&row.get::<String>(5)?)?,
        updated_at: parse_datetime(&row.get::<String>(6)?)?,
    })
}

impl StelliumStore {
    /// Store a rectification in `pending` status. Goes to the relational
    /// tier only if both referenced charts resolve there; otherwise the
    /// whole document is written to the file tier.
    pub async fn store_rectification(
        &self,
        id: Option<&str>,
        chart_id: &str,
        original_chart_id: &str,
        payload: Value,
    ) -> Result<Rectification, StoreError> {
        if chart_id.is_empty() {
            return Err(StoreError::MissingField("chart_id"));
        }
        if original_chart_id.is_empty() {
            return Err(StoreError::MissingField("original_chart_id"));
        }
        if payload.is_null() {
            return Err(StoreError::MissingField("payload"));
        }
        let now = Utc::now();
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids::new_id(ids::PREFIX_RECTIFICATION)?,
        };
        let refs = [
            EntityRef::chart(chart_id),
            EntityRef::chart(original_chart_id),
        ];

        if let Some(pool) = self.backend().await? {
            match self
                .store_rectification_relational(&pool, &id, chart_id, original_chart_id, &payload, now, &refs)
                .await
            {
                Ok(Some(rectification)) => return Ok(rectification),
                Ok(None) => {
                    tracing::debug!(id = %id, "Referential veto; writing rectification to file tier");
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Relational rectification store failed; falling back to file tier");
                }
            }
        }

        let created_at = match self
            .files()
            .get::<Rectification>(EntityKind::Rectification, &id)
            .await?
        {
            Some(previous) => previous.created_at,
            None => now,
        };
        let rectification = Rectification {
            id,
            chart_id: chart_id.to_string(),
            original_chart_id: original_chart_id.to_string(),
            payload,
            status: RectificationStatus::Pending,
            created_at,
            updated_at: now,
        };
        self.files()
            .put(EntityKind::Rectification, &rectification.id, &rectification)
            .await?;
        Ok(rectification)
    }

    pub async fn get_rectification(
        &self,
        id: &str,
    ) -> Result<Option<Rectification>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.get_rectification_relational(&pool, id).await {
                Ok(Some(rectification)) => return Ok(Some(rectification)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, error = %e, "Relational rectification lookup failed; trying file tier");
                }
            }
        }
        self.files().get(EntityKind::Rectification, id).await
    }

    /// Advance the rectification state machine (`pending → completed` or
    /// `pending → failed`).
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTransition` (wrapped) if the transition is
    /// not allowed from the current status.
    pub async fn update_rectification_status(
        &self,
        id: &str,
        next: RectificationStatus,
    ) -> Result<Option<Rectification>, StoreError> {
        let Some(current) = self.get_rectification(id).await? else {
            return Ok(None);
        };
        if !current.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let updated = Rectification {
            status: next,
            updated_at: Utc::now(),
            ..current
        };

        // File tier is authoritative when the document exists there.
        if !self.files().contains(EntityKind::Rectification, id).await {
            if let Some(pool) = self.backend().await? {
                match self.update_status_relational(&pool, &updated).await {
                    Ok(true) => return Ok(Some(updated)),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(id, error = %e, "Relational status update failed; falling back to file tier");
                    }
                }
            }
        }
        self.files()
            .put(EntityKind::Rectification, id, &updated)
            .await?;
        Ok(Some(updated))
    }

    pub async fn delete_rectification(&self, id: &str) -> Result<bool, StoreError> {
        let mut deleted = self.files().delete(EntityKind::Rectification, id).await?;
        if let Some(pool) = self.backend().await? {
            match self.delete_rectification_relational(&pool, id).await {
                Ok(relational_deleted) => deleted = deleted || relational_deleted,
                Err(e) => tracing::warn!(id, error = %e, "Relational rectification delete failed"),
            }
        }
        Ok(deleted)
    }

    pub async fn list_rectifications(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Rectification>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.list_rectifications_relational(&pool, limit, offset).await {
                Ok(rectifications) => return Ok(rectifications),
                Err(e) => {
                    tracing::warn!(error = %e, "Relational rectification list failed; falling back to file tier");
                }
            }
        }
        self.files().list(EntityKind::Rectification, limit, offset).await
    }

    /// Upsert via the relational tier; `Ok(None)` means the consistency
    /// guard vetoed the write.
    #[allow(clippy::too_many_arguments)]
    async fn store_rectification_relational(
        &self,
        pool: &DbPool,
        id: &str,
        chart_id: &str,
        original_chart_id: &str,
        payload: &Value,
        now: DateTime<Utc>,
        refs: &[EntityRef],
    ) -> Result<Option<Rectification>, StoreError> {
        let conn = pool.acquire().await?;
        if self.selector().tier_for_write(Some(&*conn), refs).await == Tier::File {
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO rectifications (id, chart_id, original_chart_id, payload, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 chart_id = excluded.chart_id,
                 original_chart_id = excluded.original_chart_id,
                 payload = excluded.payload,
                 status = excluded.status,
                 updated_at = excluded.updated_at",
            libsql::params![
                id,
                chart_id,
                original_chart_id,
                serde_json::to_string(payload)?,
                RectificationStatus::Pending.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT id, chart_id, original_chart_id, payload, status, created_at, updated_at
                 FROM rectifications WHERE id = ?1",
                [id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Query(format!("rectification {id} missing after upsert")))?;
        Ok(Some(row_to_rectification(&row)?))
    }

    async fn get_rectification_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<Option<Rectification>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart_id, original_chart_id, payload, status, created_at, updated_at
                 FROM rectifications WHERE id = ?1",
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_rectification(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_status_relational(
        &self,
        pool: &DbPool,
        rectification: &Rectification,
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute(
                "UPDATE rectifications SET status = ?2, updated_at = ?3 WHERE id = ?1",
                libsql::params![
                    rectification.id.as_str(),
                    rectification.status.as_str(),
                    rectification.updated_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_rectification_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute("DELETE FROM rectifications WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }

    async fn list_rectifications_relational(
        &self,
        pool: &DbPool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Rectification>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart_id, original_chart_id, payload, status, created_at, updated_at
                 FROM rectifications ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                libsql::params![i64::from(limit), i64::from(offset)],
            )
            .await?;

        let mut rectifications = Vec::new();
        while let Some(row) = rows.next().await? {
            rectifications.push(row_to_rectification(&row)?);
        }
        Ok(rectifications)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{file_store, relational_store};
    use serde_json::json;

    #[tokio::test]
    async fn store_rectification_starts_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = relational_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let original = store.store_chart(None, json!({"b": 2})).await.unwrap();

        let rectification = store
            .store_rectification(None, &chart.id, &original.id, json!({"offset_minutes": 14}))
            .await
            .unwrap();

        assert!(rectification.id.starts_with("rect_"));
        assert_eq!(rectification.status, RectificationStatus::Pending);
        assert_eq!(rectification.chart_id, chart.id);
        assert_eq!(rectification.original_chart_id, original.id);

        let fetched = store
            .get_rectification(&rectification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, rectification);
    }

    #[tokio::test]
    async fn missing_chart_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());

        let result = store
            .store_rectification(None, "", "chart_aaaaaaaaaa", json!({}))
            .await;
        assert!(matches!(result, Err(StoreError::MissingField("chart_id"))));
    }

    #[tokio::test]
    async fn file_only_charts_veto_relational_write() {
        // Seed a chart while the store is file-only.
        let dir = tempfile::tempdir().unwrap();
        let file_only = file_store(dir.path());
        let chart = file_only.store_chart(None, json!({"a": 1})).await.unwrap();
        let original = file_only.store_chart(None, json!({"b": 2})).await.unwrap();

        // Same data dir, now with a live relational backend: the referenced
        // charts resolve only in the file tier, so the rectification must be
        // routed there whole.
        let store = relational_store(dir.path());
        let rectification = store
            .store_rectification(None, &chart.id, &original.id, json!({"offset_minutes": 3}))
            .await
            .unwrap();

        assert!(
            store
                .files()
                .contains(EntityKind::Rectification, &rectification.id)
                .await
        );
        let fetched = store
            .get_rectification(&rectification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, rectification);
    }

    #[tokio::test]
    async fn status_transitions_pending_to_completed() {
        for make in [file_store, relational_store] {
            let dir = tempfile::tempdir().unwrap();
            let store = make(dir.path());

            let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
            let original = store.store_chart(None, json!({"b": 2})).await.unwrap();
            let rectification = store
                .store_rectification(None, &chart.id, &original.id, json!({}))
                .await
                .unwrap();

            let completed = store
                .update_rectification_status(&rectification.id, RectificationStatus::Completed)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(completed.status, RectificationStatus::Completed);

            let fetched = store
                .get_rectification(&rectification.id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(fetched.status, RectificationStatus::Completed);
        }
    }

    #[tokio::test]
    async fn completed_rectification_rejects_further_transitions() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let original = store.store_chart(None, json!({"b": 2})).await.unwrap();
        let rectification = store
            .store_rectification(None, &chart.id, &original.id, json!({}))
            .await
            .unwrap();

        store
            .update_rectification_status(&rectification.id, RectificationStatus::Completed)
            .await
            .unwrap();
        let result = store
            .update_rectification_status(&rectification.id, RectificationStatus::Failed)
            .await;
        assert!(matches!(result, Err(StoreError::Core(_))));
    }

    #[tokio::test]
    async fn update_status_of_missing_rectification_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());

        let result = store
            .update_rectification_status("rect_absent0000", RectificationStatus::Completed)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn delete_and_list_rectifications() {
        let dir = tempfile::tempdir().unwrap();
        let store = relational_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let original = store.store_chart(None, json!({"b": 2})).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..3 {
            let r = store
                .store_rectification(None, &chart.id, &original.id, json!({}))
                .await
                .unwrap();
            ids.push(r.id);
        }

        assert_eq!(store.list_rectifications(10, 0).await.unwrap().len(), 3);
        assert!(store.delete_rectification(&ids[0]).await.unwrap());
        assert_eq!(store.list_rectifications(10, 0).await.unwrap().len(), 2);
        assert!(!store.delete_rectification(&ids[0]).await.unwrap());
    }
}
