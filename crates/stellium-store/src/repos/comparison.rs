//! Comparison repository — synastry documents, immutable after creation.

use chrono::{DateTime, Utc};
use serde_json::Value;

use stellium_core::entities::{Comparison, EntityRef};
use stellium_core::enums::EntityKind;
use stellium_core::ids;

use crate::error::StoreError;
use crate::helpers::{parse_datetime, parse_json};
use crate::pool::DbPool;
use crate::selector::Tier;
use crate::service::StelliumStore;

fn row_to_comparison(row: &libsql::Row) -> Result<Comparison, StoreError> {
    Ok(Comparison {
        id: row.get::<String>(0)?,
        chart1_id: row.get::<String>(1)?,
        chart2_id: row.get::<String>(2)?,
        payload: parse_json(&row.get::<String>(3)?)?,
        created_at: parse_datetime(&row.get::<String>(4)?)?,
    })
}

impl StelliumStore {
    /// Store a comparison. Goes to the relational tier only if both
    /// referenced charts resolve there; otherwise the whole document is
    /// written to the file tier.
    pub async fn store_comparison(
        &self,
        id: Option<&str>,
        chart1_id: &str,
        chart2_id: &str,
        payload: Value,
    ) -> Result<Comparison, StoreError> {
        if chart1_id.is_empty() {
            return Err(StoreError::MissingField("chart1_id"));
        }
        if chart2_id.is_empty() {
            return Err(StoreError::MissingField("chart2_id"));
        }
        if payload.is_null() {
            return Err(StoreError::MissingField("payload"));
        }
        let now = Utc::now();
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids::new_id(ids::PREFIX_COMPARISON)?,
        };
        let refs = [EntityRef::chart(chart1_id), EntityRef::chart(chart2_id)];

        if let Some(pool) = self.backend().await? {
            match self
                .store_comparison_relational(&pool, &id, chart1_id, chart2_id, &payload, now, &refs)
                .await
            {
                Ok(Some(comparison)) => return Ok(comparison),
                Ok(None) => {
                    tracing::debug!(id = %id, "Referential veto; writing comparison to file tier");
                }
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Relational comparison store failed; falling back to file tier");
                }
            }
        }

        let created_at = match self
            .files()
            .get::<Comparison>(EntityKind::Comparison, &id)
            .await?
        {
            Some(previous) => previous.created_at,
            None => now,
        };
        let comparison = Comparison {
            id,
            chart1_id: chart1_id.to_string(),
            chart2_id: chart2_id.to_string(),
            payload,
            created_at,
        };
        self.files()
            .put(EntityKind::Comparison, &comparison.id, &comparison)
            .await?;
        Ok(comparison)
    }

    pub async fn get_comparison(&self, id: &str) -> Result<Option<Comparison>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.get_comparison_relational(&pool, id).await {
                Ok(Some(comparison)) => return Ok(Some(comparison)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, error = %e, "Relational comparison lookup failed; trying file tier");
                }
            }
        }
        self.files().get(EntityKind::Comparison, id).await
    }

    pub async fn delete_comparison(&self, id: &str) -> Result<bool, StoreError> {
        let mut deleted = self.files().delete(EntityKind::Comparison, id).await?;
        if let Some(pool) = self.backend().await? {
            match self.delete_comparison_relational(&pool, id).await {
                Ok(relational_deleted) => deleted = deleted || relational_deleted,
                Err(e) => tracing::warn!(id, error = %e, "Relational comparison delete failed"),
            }
        }
        Ok(deleted)
    }

    pub async fn list_comparisons(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Comparison>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.list_comparisons_relational(&pool, limit, offset).await {
                Ok(comparisons) => return Ok(comparisons),
                Err(e) => {
                    tracing::warn!(error = %e, "Relational comparison list failed; falling back to file tier");
                }
            }
        }
        self.files().list(EntityKind::Comparison, limit, offset).await
    }

    /// Upsert via the relational tier; `Ok(None)` means the consistency
    /// guard vetoed the write.
    #[allow(clippy::too_many_arguments)]
    async fn store_comparison_relational(
        &self,
        pool: &DbPool,
        id: &str,
        chart1_id: &str,
        chart2_id: &str,
        payload: &Value,
        now: DateTime<Utc>,
        refs: &[EntityRef],
    ) -> Result<Option<Comparison>, StoreError> {
        let conn = pool.acquire().await?;
        if self.selector().tier_for_write(Some(&*conn), refs).await == Tier::File {
            return Ok(None);
        }

        conn.execute(
            "INSERT INTO comparisons (id, chart1_id, chart2_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                 chart1_id = excluded.chart1_id,
                 chart2_id = excluded.chart2_id,
                 payload = excluded.payload",
            libsql::params![
                id,
                chart1_id,
                chart2_id,
                serde_json::to_string(payload)?,
                now.to_rfc3339()
            ],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT id, chart1_id, chart2_id, payload, created_at
                 FROM comparisons WHERE id = ?1",
                [id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Query(format!("comparison {id} missing after upsert")))?;
        Ok(Some(row_to_comparison(&row)?))
    }

    async fn get_comparison_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<Option<Comparison>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart1_id, chart2_id, payload, created_at
                 FROM comparisons WHERE id = ?1",
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_comparison(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_comparison_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute("DELETE FROM comparisons WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }

    async fn list_comparisons_relational(
        &self,
        pool: &DbPool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Comparison>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart1_id, chart2_id, payload, created_at
                 FROM comparisons ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                libsql::params![i64::from(limit), i64::from(offset)],
            )
            .await?;

        let mut comparisons = Vec::new();
        while let Some(row) = rows.next().await? {
            comparisons.push(row_to_comparison(&row)?);
        }
        Ok(comparisons)
    }
}
