//! Chart repository — CRUD with dual-tier dispatch and legacy lookup cascade.

use chrono::{DateTime, Utc};
use serde_json::Value;

use stellium_core::entities::Chart;
use stellium_core::enums::EntityKind;
use stellium_core::ids;

use crate::error::StoreError;
use crate::helpers::{parse_datetime, parse_json};
use crate::pool::DbPool;
use crate::service::StelliumStore;

fn row_to_chart(row: &libsql::Row) -> Result<Chart, StoreError> {
    Ok(Chart {
        id: row.get::<String>(0)?,
        payload: parse_json(&row.get::<String>(1)?)?,
        created_at: parse_datetime(&row.get::<String>(2)?)?,
        updated_at: parse_datetime(&row.get::<String>(3)?)?,
    })
}

impl StelliumStore {
    /// Store a chart document, assigning an ID if none is supplied.
    /// Re-storing an existing ID replaces the payload and refreshes
    /// `updated_at`; `created_at` is preserved.
    pub async fn store_chart(
        &self,
        id: Option<&str>,
        payload: Value,
    ) -> Result<Chart, StoreError> {
        if payload.is_null() {
            return Err(StoreError::MissingField("payload"));
        }
        let now = Utc::now();
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids::new_id(ids::PREFIX_CHART)?,
        };

        if let Some(pool) = self.backend().await? {
            match self.store_chart_relational(&pool, &id, &payload, now).await {
                Ok(chart) => return Ok(chart),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Relational chart store failed; falling back to file tier");
                }
            }
        }
        self.store_chart_file(id, payload, now).await
    }

    /// Fetch a chart: relational tier first, then the file tier, then the
    /// bounded legacy lookup cascade.
    pub async fn get_chart(&self, id: &str) -> Result<Option<Chart>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.get_chart_relational(&pool, id).await {
                Ok(Some(chart)) => return Ok(Some(chart)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, error = %e, "Relational chart lookup failed; trying file tier");
                }
            }
        }
        if let Some(chart) = self.files().get(EntityKind::Chart, id).await? {
            return Ok(Some(chart));
        }
        Ok(self.locator().find(id).await)
    }

    pub async fn update_chart(
        &self,
        id: &str,
        payload: Value,
    ) -> Result<Option<Chart>, StoreError> {
        if payload.is_null() {
            return Err(StoreError::MissingField("payload"));
        }
        let now = Utc::now();
        let Some(existing) = self.get_chart(id).await? else {
            return Ok(None);
        };
        let updated = Chart {
            payload,
            updated_at: now,
            ..existing
        };

        // File tier is authoritative when the document exists there.
        if !self.files().contains(EntityKind::Chart, id).await {
            if let Some(pool) = self.backend().await? {
                match self.update_chart_relational(&pool, &updated).await {
                    Ok(true) => return Ok(Some(updated)),
                    // Held in a legacy location only — migrate it to the
                    // primary file tier below.
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(id, error = %e, "Relational chart update failed; falling back to file tier");
                    }
                }
            }
        }
        self.files().put(EntityKind::Chart, id, &updated).await?;
        Ok(Some(updated))
    }

    pub async fn delete_chart(&self, id: &str) -> Result<bool, StoreError> {
        let mut deleted = self.files().delete(EntityKind::Chart, id).await?;
        if let Some(pool) = self.backend().await? {
            match self.delete_chart_relational(&pool, id).await {
                Ok(relational_deleted) => deleted = deleted || relational_deleted,
                Err(e) => tracing::warn!(id, error = %e, "Relational chart delete failed"),
            }
        }
        Ok(deleted)
    }

    /// List charts, sliced by `limit`/`offset`. Relational listing when the
    /// pool is live, file-tier directory listing otherwise — never merged.
    pub async fn list_charts(&self, limit: u32, offset: u32) -> Result<Vec<Chart>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.list_charts_relational(&pool, limit, offset).await {
                Ok(charts) => return Ok(charts),
                Err(e) => {
                    tracing::warn!(error = %e, "Relational chart list failed; falling back to file tier");
                }
            }
        }
        self.files().list(EntityKind::Chart, limit, offset).await
    }

    async fn store_chart_relational(
        &self,
        pool: &DbPool,
        id: &str,
        payload: &Value,
        now: DateTime<Utc>,
    ) -> Result<Chart, StoreError> {
        let conn = pool.acquire().await?;
        conn.execute(
            "INSERT INTO charts (id, payload, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            libsql::params![
                id,
                serde_json::to_string(payload)?,
                now.to_rfc3339(),
                now.to_rfc3339()
            ],
        )
        .await?;

        let mut rows = conn
            .query(
                "SELECT id, payload, created_at, updated_at FROM charts WHERE id = ?1",
                [id],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| StoreError::Query(format!("chart {id} missing after upsert")))?;
        row_to_chart(&row)
    }

    async fn store_chart_file(
        &self,
        id: String,
        payload: Value,
        now: DateTime<Utc>,
    ) -> Result<Chart, StoreError> {
        let created_at = match self.files().get::<Chart>(EntityKind::Chart, &id).await? {
            Some(previous) => previous.created_at,
            None => now,
        };
        let chart = Chart {
            id,
            payload,
            created_at,
            updated_at: now,
        };
        self.files().put(EntityKind::Chart, &chart.id, &chart).await?;
        Ok(chart)
    }

    async fn get_chart_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<Option<Chart>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, payload, created_at, updated_at FROM charts WHERE id = ?1",
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_chart(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_chart_relational(
        &self,
        pool: &DbPool,
        chart: &Chart,
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute(
                "UPDATE charts SET payload = ?2, updated_at = ?3 WHERE id = ?1",
                libsql::params![
                    chart.id.as_str(),
                    serde_json::to_string(&chart.payload)?,
                    chart.updated_at.to_rfc3339()
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_chart_relational(&self, pool: &DbPool, id: &str) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn.execute("DELETE FROM charts WHERE id = ?1", [id]).await?;
        Ok(affected > 0)
    }

    async fn list_charts_relational(
        &self,
        pool: &DbPool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Chart>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, payload, created_at, updated_at FROM charts
                 ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                libsql::params![i64::from(limit), i64::from(offset)],
            )
            .await?;

        let mut charts = Vec::new();
        while let Some(row) = rows.next().await? {
            charts.push(row_to_chart(&row)?);
        }
        Ok(charts)
    }
}
