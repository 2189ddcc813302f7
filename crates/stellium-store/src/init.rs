//! One-time backend bootstrap and shutdown coordination.
//!
//! The first operation on a store triggers backend bootstrap (pool build +
//! schema ensure); concurrent first callers await the same execution via
//! `tokio::sync::OnceCell` rather than duplicating it. The bootstrap runs as
//! a spawned task when a runtime handle is available (so shutdown can abort
//! it cooperatively) and inline otherwise.
//!
//! The remembered outcome distinguishes three cases: a live relational
//! backend, file-only operation (backend absent or unreachable — the cause
//! is logged, never surfaced), and a schema defect, which is re-surfaced to
//! every caller because it indicates a broken deployment.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tokio::task::{AbortHandle, JoinHandle};

use stellium_config::StelliumConfig;

use crate::error::StoreError;
use crate::pool::DbPool;
use crate::schema;

/// How long shutdown waits for registered background tasks to finish before
/// aborting them.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Remembered result of the one-time bootstrap.
pub(crate) enum BootstrapOutcome {
    /// Pool is live and the schema is ensured.
    Relational(Arc<DbPool>),
    /// No relational backend (unconfigured, unreachable, or bootstrap
    /// cancelled). All operations use the file tier.
    FileOnly,
    /// Required schema missing outside self-heal mode — a deployment defect,
    /// re-surfaced to every caller.
    SchemaDefect(String),
}

/// Coordinates single-flight bootstrap and cooperative shutdown.
pub(crate) struct InitLifecycle {
    cell: OnceCell<BootstrapOutcome>,
    bootstrap_abort: Mutex<Option<AbortHandle>>,
    registry: TaskRegistry,
    bootstrap_runs: AtomicU32,
}

impl InitLifecycle {
    pub(crate) fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            bootstrap_abort: Mutex::new(None),
            registry: TaskRegistry::new(),
            bootstrap_runs: AtomicU32::new(0),
        }
    }

    /// Ensure the backend is bootstrapped, returning the pool if the
    /// relational tier is live.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` if bootstrap found a schema defect —
    /// every caller sees it until the deployment is fixed.
    pub(crate) async fn ensure_initialized(
        &self,
        config: &Arc<StelliumConfig>,
    ) -> Result<Option<Arc<DbPool>>, StoreError> {
        let outcome = self
            .cell
            .get_or_init(|| async {
                self.bootstrap_runs.fetch_add(1, Ordering::SeqCst);
                let config = Arc::clone(config);
                match Handle::try_current() {
                    Ok(handle) => {
                        let task = handle.spawn(bootstrap(config));
                        *lock(&self.bootstrap_abort) = Some(task.abort_handle());
                        let outcome = match task.await {
                            Ok(outcome) => outcome,
                            Err(e) => {
                                tracing::warn!(error = %e, "Bootstrap task cancelled; running file-only");
                                BootstrapOutcome::FileOnly
                            }
                        };
                        *lock(&self.bootstrap_abort) = None;
                        outcome
                    }
                    // No concurrent execution context — run inline.
                    Err(_) => bootstrap(config).await,
                }
            })
            .await;

        match outcome {
            BootstrapOutcome::Relational(pool) => Ok(Some(Arc::clone(pool))),
            BootstrapOutcome::FileOnly => Ok(None),
            BootstrapOutcome::SchemaDefect(msg) => Err(StoreError::Schema(msg.clone())),
        }
    }

    /// Register a fire-and-forget background task (e.g., a download-count
    /// increment) so shutdown can drain it.
    pub(crate) fn spawn_supervised(
        &self,
        fut: impl Future<Output = ()> + Send + 'static,
    ) {
        self.registry.spawn(fut);
    }

    /// Best-effort cleanup: abort an in-flight bootstrap, drain registered
    /// tasks, close the pool. Never raises.
    pub(crate) async fn shutdown(&self) {
        if let Some(abort) = lock(&self.bootstrap_abort).take() {
            abort.abort();
        }

        self.registry.drain(DRAIN_GRACE).await;

        if let Some(BootstrapOutcome::Relational(pool)) = self.cell.get() {
            pool.close().await;
        }
    }

    /// How many times the bootstrap actually executed (single-flight: stays
    /// at 1 no matter how many callers raced).
    #[cfg(test)]
    pub(crate) fn bootstrap_runs(&self) -> u32 {
        self.bootstrap_runs.load(Ordering::SeqCst)
    }
}

/// Build the pool and ensure the schema. Availability failures are logged
/// and degrade to file-only; schema defects are remembered as fatal.
async fn bootstrap(config: Arc<StelliumConfig>) -> BootstrapOutcome {
    if !config.database.is_configured() {
        tracing::debug!("No relational backend configured; running file-only");
        return BootstrapOutcome::FileOnly;
    }

    let pool = match DbPool::build(&config.database).await {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::warn!(error = %e, "Relational backend unavailable; running file-only");
            return BootstrapOutcome::FileOnly;
        }
    };

    let schema_result = {
        let conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Could not acquire bootstrap connection; running file-only");
                return BootstrapOutcome::FileOnly;
            }
        };
        schema::ensure_schema(&conn, config.runtime.schema_self_heal).await
    };

    match schema_result {
        Ok(()) => {
            tracing::info!("Relational backend initialized");
            BootstrapOutcome::Relational(pool)
        }
        Err(StoreError::Schema(msg)) => {
            tracing::error!(error = %msg, "Schema defect detected during bootstrap");
            BootstrapOutcome::SchemaDefect(msg)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Schema bootstrap failed; running file-only");
            BootstrapOutcome::FileOnly
        }
    }
}

/// Supervised background task registry: one owner holds the handles, and
/// shutdown drains them with a bounded grace period.
pub(crate) struct TaskRegistry {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        if let Ok(handle) = Handle::try_current() {
            let mut handles = lock(&self.handles);
            handles.retain(|h| !h.is_finished());
            handles.push(handle.spawn(fut));
        }
    }

    pub(crate) async fn drain(&self, grace: Duration) {
        let handles = std::mem::take(&mut *lock(&self.handles));
        for mut handle in handles {
            if handle.is_finished() {
                continue;
            }
            if tokio::time::timeout(grace, &mut handle).await.is_err() {
                tracing::warn!("Background task did not finish within grace period; aborting");
                handle.abort();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
