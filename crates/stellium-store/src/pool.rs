//! Bounded libSQL connection pool.
//!
//! One pool per store. Checkout is bounded by a semaphore sized to
//! `database.max_connections`; idle connections are parked and reused. The
//! RAII [`PooledConn`] guard returns its connection on drop on all exit
//! paths, so a failed operation never leaks a checkout.

use std::ops::Deref;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};

use stellium_config::DatabaseConfig;

use crate::error::StoreError;

/// Shared, bounded pool of libSQL connections.
pub(crate) struct DbPool {
    db: libsql::Database,
    idle: Mutex<Vec<libsql::Connection>>,
    permits: Semaphore,
    max_connections: u32,
    close_timeout: Duration,
    closed: AtomicBool,
}

impl DbPool {
    /// Open the configured backend (remote URL or local file) and pre-open
    /// `min_connections` connections.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the database cannot be opened or the eager
    /// connections fail — the caller records this and treats the relational
    /// backend as absent.
    pub(crate) async fn build(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let db = if config.is_remote() {
            libsql::Builder::new_remote(config.url.clone(), config.auth_token.clone())
                .build()
                .await?
        } else {
            libsql::Builder::new_local(&config.path).build().await?
        };

        let pool = Self {
            db,
            idle: Mutex::new(Vec::new()),
            permits: Semaphore::new(config.max_connections as usize),
            max_connections: config.max_connections,
            close_timeout: Duration::from_secs(config.close_timeout_secs),
            closed: AtomicBool::new(false),
        };

        let min = config.min_connections.min(config.max_connections);
        let mut eager = Vec::with_capacity(min as usize);
        for _ in 0..min {
            eager.push(pool.open_connection().await?);
        }
        *lock(&pool.idle) = eager;

        Ok(pool)
    }

    /// Check out a connection, waiting if all `max_connections` are in use.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the pool is closed, or a libSQL
    /// error if a fresh connection cannot be opened.
    pub(crate) async fn acquire(&self) -> Result<PooledConn<'_>, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("pool is closed".into()));
        }
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StoreError::Unavailable("pool is closed".into()))?;

        let parked = lock(&self.idle).pop();
        let conn = match parked {
            Some(conn) => conn,
            None => self.open_connection().await?,
        };

        Ok(PooledConn {
            conn: Some(conn),
            pool: self,
            _permit: permit,
        })
    }

    /// Close the pool: wait (bounded) for outstanding checkouts, then refuse
    /// further acquires and drop all idle connections.
    ///
    /// Safe to call more than once and safe to call concurrently with
    /// in-flight operations.
    pub(crate) async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let all = self.permits.acquire_many(self.max_connections);
        match tokio::time::timeout(self.close_timeout, all).await {
            Ok(Ok(permits)) => permits.forget(),
            Ok(Err(_)) => {}
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.close_timeout.as_secs(),
                    "Pool close timed out waiting for outstanding connections"
                );
            }
        }

        self.permits.close();
        lock(&self.idle).clear();
    }

    async fn open_connection(&self) -> Result<libsql::Connection, StoreError> {
        let conn = self.db.connect()?;
        // Foreign keys must be enabled per-connection in SQLite.
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| StoreError::Query(format!("PRAGMA foreign_keys: {e}")))?;
        Ok(conn)
    }
}

/// RAII checkout guard. Dereferences to the connection; returns it to the
/// pool on drop.
pub(crate) struct PooledConn<'a> {
    conn: Option<libsql::Connection>,
    pool: &'a DbPool,
    _permit: SemaphorePermit<'a>,
}

impl Deref for PooledConn<'_> {
    type Target = libsql::Connection;

    fn deref(&self) -> &Self::Target {
        // Invariant: `conn` is Some from construction until drop.
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !self.pool.closed.load(Ordering::SeqCst) {
                lock(&self.pool.idle).push(conn);
            }
        }
    }
}

/// Lock a mutex, recovering from poisoning (a panicked holder cannot leave a
/// `Vec<Connection>` in a torn state).
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db_config(dir: &std::path::Path) -> DatabaseConfig {
        DatabaseConfig {
            path: dir.join("pool.db").to_string_lossy().into_owned(),
            min_connections: 1,
            max_connections: 2,
            close_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn acquire_executes_queries() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::build(&test_db_config(dir.path())).await.unwrap();

        let conn = pool.acquire().await.unwrap();
        conn.execute("CREATE TABLE t (id TEXT PRIMARY KEY)", ())
            .await
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES ('a')", ())
            .await
            .unwrap();

        let mut rows = conn.query("SELECT count(*) FROM t", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    #[tokio::test]
    async fn connections_are_reused_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::build(&test_db_config(dir.path())).await.unwrap();

        for _ in 0..5 {
            let conn = pool.acquire().await.unwrap();
            conn.execute("SELECT 1", ()).await.unwrap();
            // Guard drops here, returning the connection.
        }

        // max_connections is 2; 5 sequential checkouts only work if the
        // guard returns its permit and connection.
        assert!(pool.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn acquire_after_close_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::build(&test_db_config(dir.path())).await.unwrap();

        pool.close().await;
        let result = pool.acquire().await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::build(&test_db_config(dir.path())).await.unwrap();

        pool.close().await;
        pool.close().await;
    }

    #[tokio::test]
    async fn close_waits_for_outstanding_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let pool = std::sync::Arc::new(DbPool::build(&test_db_config(dir.path())).await.unwrap());

        let conn = pool.acquire().await.unwrap();
        let closer = {
            let pool = std::sync::Arc::clone(&pool);
            tokio::spawn(async move { pool.close().await })
        };

        // Release the checkout; close should then complete promptly.
        drop(conn);
        closer.await.unwrap();
        assert!(pool.acquire().await.is_err());
    }

    #[tokio::test]
    async fn build_failure_for_bad_path() {
        let config = DatabaseConfig {
            path: "/nonexistent-root-dir/definitely/missing/pool.db".into(),
            ..Default::default()
        };
        assert!(DbPool::build(&config).await.is_err());
    }
}
