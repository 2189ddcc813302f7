//! Schema bootstrap and verification.
//!
//! Embeds the SQL migration file at compile time and executes it on backend
//! bootstrap. All statements use `IF NOT EXISTS` for idempotent re-running.
//! After the batch, every expected column is verified via `PRAGMA
//! table_info`: in self-heal mode missing columns are added with inferred
//! types; in normal mode a missing table or column is a fatal
//! `StoreError::Schema` — it indicates a deployment defect, not a transient
//! condition.

use crate::error::StoreError;

/// Initial schema: 4 entity tables, 6 indexes on reference columns.
const MIGRATION_001: &str = include_str!("../migrations/001_initial.sql");

/// Expected columns per table, checked after the migration batch runs.
const EXPECTED_COLUMNS: &[(&str, &[&str])] = &[
    ("charts", &["id", "payload", "created_at", "updated_at"]),
    (
        "rectifications",
        &[
            "id",
            "chart_id",
            "original_chart_id",
            "payload",
            "status",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "comparisons",
        &["id", "chart1_id", "chart2_id", "payload", "created_at"],
    ),
    (
        "exports",
        &[
            "id",
            "chart_id",
            "file_path",
            "format",
            "download_url",
            "generated_at",
            "expires_at",
            "download_count",
        ],
    ),
];

/// Run the embedded migration batch, then verify (and in self-heal mode,
/// repair) the resulting schema.
///
/// # Errors
///
/// Returns `StoreError::Schema` if the batch fails, or — outside self-heal
/// mode — if a required table or column is missing afterwards.
pub(crate) async fn ensure_schema(
    conn: &libsql::Connection,
    self_heal: bool,
) -> Result<(), StoreError> {
    conn.execute_batch(MIGRATION_001)
        .await
        .map_err(|e| StoreError::Schema(format!("001_initial: {e}")))?;
    verify_schema(conn, self_heal).await
}

async fn verify_schema(conn: &libsql::Connection, self_heal: bool) -> Result<(), StoreError> {
    for (table, expected) in EXPECTED_COLUMNS {
        let present = table_columns(conn, table).await?;
        if present.is_empty() {
            // CREATE IF NOT EXISTS just ran; an absent table is a defect in
            // both modes.
            return Err(StoreError::Schema(format!(
                "table '{table}' missing after migration"
            )));
        }

        for column in *expected {
            if present.iter().any(|c| c == column) {
                continue;
            }
            if self_heal {
                tracing::warn!(table, column, "Self-healing missing column");
                let ddl = format!(
                    "ALTER TABLE {table} ADD COLUMN {column} {}",
                    inferred_column_type(column)
                );
                conn.execute(&ddl, ()).await.map_err(|e| {
                    StoreError::Schema(format!("self-heal {table}.{column}: {e}"))
                })?;
            } else {
                return Err(StoreError::Schema(format!(
                    "column '{table}.{column}' missing; run migrations or enable \
                     runtime.schema_self_heal in test environments"
                )));
            }
        }
    }
    Ok(())
}

async fn table_columns(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Vec<String>, StoreError> {
    let mut rows = conn
        .query(&format!("PRAGMA table_info({table})"), ())
        .await?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next().await? {
        // table_info: (cid, name, type, notnull, dflt_value, pk)
        columns.push(row.get::<String>(1)?);
    }
    Ok(columns)
}

/// Column type for self-healed columns. Counters are integers; everything
/// else in this schema is TEXT.
fn inferred_column_type(column: &str) -> &'static str {
    if column.ends_with("_count") {
        "INTEGER NOT NULL DEFAULT 0"
    } else {
        "TEXT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> libsql::Connection {
        let db = libsql::Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn ensure_schema_creates_all_tables() {
        let conn = test_conn().await;
        ensure_schema(&conn, false).await.unwrap();

        for (table, _) in EXPECTED_COLUMNS {
            let mut rows = conn
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap();
            assert!(row.is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test]
    async fn ensure_schema_is_idempotent() {
        let conn = test_conn().await;
        ensure_schema(&conn, false).await.unwrap();
        ensure_schema(&conn, false).await.unwrap();
    }

    #[tokio::test]
    async fn reference_indices_exist() {
        let conn = test_conn().await;
        ensure_schema(&conn, false).await.unwrap();

        let indices = [
            "idx_rectifications_chart_id",
            "idx_comparisons_chart1_id",
            "idx_comparisons_chart2_id",
            "idx_exports_chart_id",
        ];
        for index in indices {
            let mut rows = conn
                .query(
                    "SELECT name FROM sqlite_master WHERE type='index' AND name=?1",
                    [index],
                )
                .await
                .unwrap();
            assert!(
                rows.next().await.unwrap().is_some(),
                "index '{index}' should exist"
            );
        }
    }

    #[tokio::test]
    async fn missing_column_is_fatal_in_normal_mode() {
        let conn = test_conn().await;
        // A charts table from an older generation, missing updated_at.
        conn.execute(
            "CREATE TABLE charts (id TEXT PRIMARY KEY, payload TEXT NOT NULL, created_at TEXT NOT NULL)",
            (),
        )
        .await
        .unwrap();

        let result = ensure_schema(&conn, false).await;
        assert!(matches!(result, Err(StoreError::Schema(_))));
    }

    #[tokio::test]
    async fn missing_column_is_added_in_self_heal_mode() {
        let conn = test_conn().await;
        conn.execute(
            "CREATE TABLE exports (id TEXT PRIMARY KEY, chart_id TEXT NOT NULL, file_path TEXT NOT NULL, format TEXT NOT NULL, download_url TEXT, generated_at TEXT NOT NULL, expires_at TEXT NOT NULL)",
            (),
        )
        .await
        .unwrap();

        ensure_schema(&conn, true).await.unwrap();

        let columns = table_columns(&conn, "exports").await.unwrap();
        assert!(columns.iter().any(|c| c == "download_count"));

        // Healed counter column gets an integer default.
        conn.execute(
            "INSERT INTO charts (id, payload, created_at, updated_at) VALUES ('chart_1', '{}', '2026-01-01T00:00:00+00:00', '2026-01-01T00:00:00+00:00')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO exports (id, chart_id, file_path, format, generated_at, expires_at) VALUES ('export_1', 'chart_1', '/tmp/x.pdf', 'pdf', '2026-01-01T00:00:00+00:00', '2027-01-01T00:00:00+00:00')",
            (),
        )
        .await
        .unwrap();
        let mut rows = conn
            .query("SELECT download_count FROM exports WHERE id='export_1'", ())
            .await
            .unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }
}
