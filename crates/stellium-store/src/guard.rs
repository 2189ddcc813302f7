//! Referential consistency guard.
//!
//! Before a relational write that references other entities (a comparison
//! referencing two charts, an export referencing one), every reference must
//! resolve in the relational tier itself. A reference that lives only in the
//! file tier would either trip a foreign-key constraint or leave an orphaned
//! row — so the guard vetoes the relational write and the whole document
//! goes to the file tier instead. The veto is a routing signal, never an
//! error surfaced to the caller.

use stellium_core::entities::EntityRef;

use crate::error::StoreError;

/// Whether all `refs` resolve in the relational tier.
///
/// Any miss — or any failure to determine existence — vetoes the write.
pub(crate) async fn can_write_relational(
    conn: &libsql::Connection,
    refs: &[EntityRef],
) -> bool {
    for entity_ref in refs {
        match ref_exists(conn, entity_ref).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    reference = %entity_ref,
                    "Reference not in relational tier; vetoing relational write"
                );
                return false;
            }
            Err(e) => {
                tracing::warn!(
                    reference = %entity_ref,
                    error = %e,
                    "Reference existence check failed; vetoing relational write"
                );
                return false;
            }
        }
    }
    true
}

async fn ref_exists(
    conn: &libsql::Connection,
    entity_ref: &EntityRef,
) -> Result<bool, StoreError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", entity_ref.kind.table());
    let mut rows = conn.query(&sql, [entity_ref.id.as_str()]).await?;
    Ok(rows.next().await?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    async fn test_conn() -> libsql::Connection {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        schema::ensure_schema(&conn, false).await.unwrap();
        conn
    }

    async fn insert_chart(conn: &libsql::Connection, id: &str) {
        conn.execute(
            "INSERT INTO charts (id, payload, created_at, updated_at) VALUES (?1, '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
            [id],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn all_refs_present_allows_write() {
        let conn = test_conn().await;
        insert_chart(&conn, "chart_aaaaaaaaaa").await;
        insert_chart(&conn, "chart_bbbbbbbbbb").await;

        let refs = [
            EntityRef::chart("chart_aaaaaaaaaa"),
            EntityRef::chart("chart_bbbbbbbbbb"),
        ];
        assert!(can_write_relational(&conn, &refs).await);
    }

    #[tokio::test]
    async fn missing_ref_vetoes_write() {
        let conn = test_conn().await;
        insert_chart(&conn, "chart_aaaaaaaaaa").await;

        let refs = [
            EntityRef::chart("chart_aaaaaaaaaa"),
            EntityRef::chart("chart_cccccccccc"),
        ];
        assert!(!can_write_relational(&conn, &refs).await);
    }

    #[tokio::test]
    async fn empty_refs_allow_write() {
        let conn = test_conn().await;
        assert!(can_write_relational(&conn, &[]).await);
    }
}
