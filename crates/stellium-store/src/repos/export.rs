//! Export repository — expiry-aware reads and asynchronous download counting.

use chrono::{DateTime, Utc};

use stellium_core::entities::{EntityRef, Export, NewExport};
use stellium_core::enums::EntityKind;
use stellium_core::ids;

use crate::error::StoreError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum};
use crate::pool::DbPool;
use crate::selector::Tier;
use crate::service::StelliumStore;

fn row_to_export(row: &libsql::Row) -> Result<Export, StoreError> {
    let download_count = row.get::<i64>(7)?;
    Ok(Export {
        id: row.get::<String>(0)?,
        chart_id: row.get::<String>(1)?,
        file_path: row.get::<String>(2)?,
        format: parse_enum(&row.get::<String>(3)?)?,
        download_url: get_opt_string(row, 4)?,
        generated_at: parse_datetime(&row.get::<String>(5)?)?,
        expires_at: parse_datetime(&row.get::<String>(6)?)?,
        download_count: u64::try_from(download_count).unwrap_or(0),
    })
}

impl StelliumStore {
    /// Store an export. Goes to the relational tier only if the referenced
    /// chart resolves there; otherwise the whole document is written to the
    /// file tier.
    pub async fn store_export(
        &self,
        id: Option<&str>,
        new: NewExport,
    ) -> Result<Export, StoreError> {
        if new.chart_id.is_empty() {
            return Err(StoreError::MissingField("chart_id"));
        }
        if new.file_path.is_empty() {
            return Err(StoreError::MissingField("file_path"));
        }
        let now = Utc::now();
        let id = match id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => ids::new_id(ids::PREFIX_EXPORT)?,
        };
        let refs = [EntityRef::chart(new.chart_id.as_str())];

        let export = Export {
            id,
            chart_id: new.chart_id,
            file_path: new.file_path,
            format: new.format,
            download_url: new.download_url,
            generated_at: now,
            expires_at: new.expires_at,
            download_count: 0,
        };

        if let Some(pool) = self.backend().await? {
            match self.store_export_relational(&pool, &export, &refs).await {
                Ok(true) => return Ok(export),
                Ok(false) => {
                    tracing::debug!(id = %export.id, "Referential veto; writing export to file tier");
                }
                Err(e) => {
                    tracing::warn!(id = %export.id, error = %e, "Relational export store failed; falling back to file tier");
                }
            }
        }

        self.files().put(EntityKind::Export, &export.id, &export).await?;
        Ok(export)
    }

    /// Fetch an export, honoring `expires_at` as a hard read boundary: an
    /// expired export reads as not available even though the document still
    /// exists. A successful read schedules a download-count increment off
    /// the read path.
    pub async fn get_export(&self, id: &str) -> Result<Option<Export>, StoreError> {
        let Some(export) = self.fetch_export(id).await? else {
            return Ok(None);
        };
        if export.expires_at <= Utc::now() {
            tracing::debug!(id, "Export expired; reporting not available");
            return Ok(None);
        }

        let store = self.clone();
        let export_id = export.id.clone();
        self.lifecycle().spawn_supervised(async move {
            if let Err(e) = store.increment_download_count(&export_id).await {
                tracing::warn!(id = %export_id, error = %e, "Download count increment failed");
            }
        });

        Ok(Some(export))
    }

    /// Bump the download counter on whichever tier holds the export.
    /// Returns whether an export was found. Expiry does not gate this —
    /// it is bookkeeping, not a read.
    pub async fn increment_download_count(&self, id: &str) -> Result<bool, StoreError> {
        if let Some(mut export) = self.files().get::<Export>(EntityKind::Export, id).await? {
            export.download_count += 1;
            self.files().put(EntityKind::Export, id, &export).await?;
            return Ok(true);
        }

        if let Some(pool) = self.backend().await? {
            match self.increment_download_count_relational(&pool, id).await {
                Ok(found) => return Ok(found),
                Err(e) => {
                    tracing::warn!(id, error = %e, "Relational download count increment failed");
                }
            }
        }
        Ok(false)
    }

    pub async fn delete_export(&self, id: &str) -> Result<bool, StoreError> {
        let mut deleted = self.files().delete(EntityKind::Export, id).await?;
        if let Some(pool) = self.backend().await? {
            match self.delete_export_relational(&pool, id).await {
                Ok(relational_deleted) => deleted = deleted || relational_deleted,
                Err(e) => tracing::warn!(id, error = %e, "Relational export delete failed"),
            }
        }
        Ok(deleted)
    }

    pub async fn list_exports(&self, limit: u32, offset: u32) -> Result<Vec<Export>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.list_exports_relational(&pool, limit, offset).await {
                Ok(exports) => return Ok(exports),
                Err(e) => {
                    tracing::warn!(error = %e, "Relational export list failed; falling back to file tier");
                }
            }
        }
        self.files().list(EntityKind::Export, limit, offset).await
    }

    /// Delete exports whose `expires_at` is at or before `now`, on both
    /// tiers. Returns how many documents were removed. Explicit call — no
    /// background timer lives in this layer.
    pub async fn purge_expired_exports(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut purged = 0;

        let file_exports: Vec<Export> =
            self.files().list(EntityKind::Export, u32::MAX, 0).await?;
        for export in file_exports {
            if export.expires_at <= now && self.files().delete(EntityKind::Export, &export.id).await? {
                purged += 1;
            }
        }

        if let Some(pool) = self.backend().await? {
            match self.purge_expired_relational(&pool, now).await {
                Ok(count) => purged += count,
                Err(e) => tracing::warn!(error = %e, "Relational expired-export purge failed"),
            }
        }
        Ok(purged)
    }

    /// Raw fetch with no expiry logic; shared by `get_export` and the
    /// housekeeping paths.
    async fn fetch_export(&self, id: &str) -> Result<Option<Export>, StoreError> {
        if let Some(pool) = self.backend().await? {
            match self.get_export_relational(&pool, id).await {
                Ok(Some(export)) => return Ok(Some(export)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(id, error = %e, "Relational export lookup failed; trying file tier");
                }
            }
        }
        self.files().get(EntityKind::Export, id).await
    }

    /// Upsert via the relational tier; `Ok(false)` means the consistency
    /// guard vetoed the write.
    async fn store_export_relational(
        &self,
        pool: &DbPool,
        export: &Export,
        refs: &[EntityRef],
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        if self.selector().tier_for_write(Some(&*conn), refs).await == Tier::File {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO exports (id, chart_id, file_path, format, download_url, generated_at, expires_at, download_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                 chart_id = excluded.chart_id,
                 file_path = excluded.file_path,
                 format = excluded.format,
                 download_url = excluded.download_url,
                 generated_at = excluded.generated_at,
                 expires_at = excluded.expires_at,
                 download_count = excluded.download_count",
            libsql::params![
                export.id.as_str(),
                export.chart_id.as_str(),
                export.file_path.as_str(),
                export.format.as_str(),
                export.download_url.as_deref(),
                export.generated_at.to_rfc3339(),
                export.expires_at.to_rfc3339(),
                0i64
            ],
        )
        .await?;
        Ok(true)
    }

    async fn get_export_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<Option<Export>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart_id, file_path, format, download_url, generated_at, expires_at, download_count
                 FROM exports WHERE id = ?1",
                [id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_export(&row)?)),
            None => Ok(None),
        }
    }

    async fn increment_download_count_relational(
        &self,
        pool: &DbPool,
        id: &str,
    ) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute(
                "UPDATE exports SET download_count = download_count + 1 WHERE id = ?1",
                [id],
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete_export_relational(&self, pool: &DbPool, id: &str) -> Result<bool, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute("DELETE FROM exports WHERE id = ?1", [id])
            .await?;
        Ok(affected > 0)
    }

    async fn list_exports_relational(
        &self,
        pool: &DbPool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Export>, StoreError> {
        let conn = pool.acquire().await?;
        let mut rows = conn
            .query(
                "SELECT id, chart_id, file_path, format, download_url, generated_at, expires_at, download_count
                 FROM exports ORDER BY generated_at DESC LIMIT ?1 OFFSET ?2",
                libsql::params![i64::from(limit), i64::from(offset)],
            )
            .await?;

        let mut exports = Vec::new();
        while let Some(row) = rows.next().await? {
            exports.push(row_to_export(&row)?);
        }
        Ok(exports)
    }

    async fn purge_expired_relational(
        &self,
        pool: &DbPool,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let conn = pool.acquire().await?;
        let affected = conn
            .execute(
                "DELETE FROM exports WHERE expires_at <= ?1",
                [now.to_rfc3339()],
            )
            .await?;
        Ok(usize::try_from(affected).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{file_store, relational_store};
    use chrono::Duration;
    use serde_json::json;
    use stellium_core::enums::ExportFormat;

    fn new_export(chart_id: &str, expires_at: DateTime<Utc>) -> NewExport {
        NewExport {
            chart_id: chart_id.to_string(),
            file_path: "/var/lib/stellium/exports/chart.pdf".into(),
            format: ExportFormat::Pdf,
            download_url: Some("https://example.com/exports/chart.pdf".into()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn store_and_get_export_roundtrip() {
        for make in [file_store, relational_store] {
            let dir = tempfile::tempdir().unwrap();
            let store = make(dir.path());

            let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
            let export = store
                .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
                .await
                .unwrap();

            assert!(export.id.starts_with("export_"));
            assert_eq!(export.download_count, 0);

            let fetched = store.get_export(&export.id).await.unwrap().unwrap();
            assert_eq!(fetched.chart_id, chart.id);
            assert_eq!(fetched.format, ExportFormat::Pdf);
        }
    }

    #[tokio::test]
    async fn expired_export_reads_as_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let expired = store
            .store_export(None, new_export(&chart.id, Utc::now() - Duration::hours(1)))
            .await
            .unwrap();
        let live = store
            .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        // The expired document still exists physically...
        assert!(store.files().contains(EntityKind::Export, &expired.id).await);
        // ...but reads as not available.
        assert!(store.get_export(&expired.id).await.unwrap().is_none());
        assert!(store.get_export(&live.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn increment_download_count_in_both_tiers() {
        for make in [file_store, relational_store] {
            let dir = tempfile::tempdir().unwrap();
            let store = make(dir.path());

            let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
            let export = store
                .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
                .await
                .unwrap();

            assert!(store.increment_download_count(&export.id).await.unwrap());
            assert!(store.increment_download_count(&export.id).await.unwrap());

            // Read the raw document to avoid racing the get_export side
            // effect.
            let fetched = store.fetch_export(&export.id).await.unwrap().unwrap();
            assert_eq!(fetched.download_count, 2);
        }
    }

    #[tokio::test]
    async fn increment_of_missing_export_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());
        assert!(!store.increment_download_count("export_absent00").await.unwrap());
    }

    #[tokio::test]
    async fn get_export_schedules_download_count_increment() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let export = store
            .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        let fetched = store.get_export(&export.id).await.unwrap().unwrap();
        // The read itself returns the pre-increment count.
        assert_eq!(fetched.download_count, 0);

        // Shutdown drains the supervised increment task.
        store.shutdown().await;
        let after = store.fetch_export(&export.id).await.unwrap().unwrap();
        assert_eq!(after.download_count, 1);
    }

    #[tokio::test]
    async fn file_only_chart_routes_export_to_file_tier() {
        let dir = tempfile::tempdir().unwrap();

        let file_only = file_store(dir.path());
        let chart = file_only.store_chart(None, json!({"a": 1})).await.unwrap();

        let store = relational_store(dir.path());
        let export = store
            .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert!(store.files().contains(EntityKind::Export, &export.id).await);
    }

    #[tokio::test]
    async fn purge_expired_exports_removes_only_expired() {
        for make in [file_store, relational_store] {
            let dir = tempfile::tempdir().unwrap();
            let store = make(dir.path());

            let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
            let expired = store
                .store_export(None, new_export(&chart.id, Utc::now() - Duration::hours(1)))
                .await
                .unwrap();
            let live = store
                .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
                .await
                .unwrap();

            let purged = store.purge_expired_exports(Utc::now()).await.unwrap();
            assert_eq!(purged, 1);
            assert!(store.fetch_export(&expired.id).await.unwrap().is_none());
            assert!(store.fetch_export(&live.id).await.unwrap().is_some());
        }
    }

    #[tokio::test]
    async fn delete_and_list_exports() {
        let dir = tempfile::tempdir().unwrap();
        let store = relational_store(dir.path());

        let chart = store.store_chart(None, json!({"a": 1})).await.unwrap();
        let export = store
            .store_export(None, new_export(&chart.id, Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(store.list_exports(10, 0).await.unwrap().len(), 1);
        assert!(store.delete_export(&export.id).await.unwrap());
        assert!(store.list_exports(10, 0).await.unwrap().is_empty());
    }
}
