//! Service layer composing the persistence components.
//!
//! `StelliumStore` wraps the file tier, the legacy chart locator, the tier
//! selector, and the init lifecycle. All entity methods are implemented as
//! `impl StelliumStore` blocks in the `repos` modules; every one of them
//! starts by ensuring the backend is bootstrapped and then dispatches
//! through the selector. Callers never see which tier served them — the
//! only caller-visible failures are "not found" and validation errors on
//! malformed input.

use std::sync::Arc;

use stellium_config::StelliumConfig;

use crate::error::StoreError;
use crate::files::FileStore;
use crate::init::InitLifecycle;
use crate::locate::ChartLocator;
use crate::pool::DbPool;
use crate::selector::BackendSelector;

/// Dual-tier entity store for charts, rectifications, comparisons, and
/// exports.
///
/// Cheap to clone; clones share the pool, the file tier, and the bootstrap
/// state. Per-ID writes are last-writer-wins — callers needing strict per-ID
/// serialization must impose it externally.
#[derive(Clone)]
pub struct StelliumStore {
    config: Arc<StelliumConfig>,
    files: Arc<FileStore>,
    locator: Arc<ChartLocator>,
    selector: BackendSelector,
    lifecycle: Arc<InitLifecycle>,
}

impl StelliumStore {
    /// Create a store from configuration. No I/O happens here; the backend
    /// bootstraps on first use (or via [`Self::ensure_initialized`]).
    #[must_use]
    pub fn new(config: StelliumConfig) -> Self {
        let files = Arc::new(FileStore::new(&config.storage.data_dir));
        let locator = Arc::new(ChartLocator::from_config(&config.storage));
        Self {
            config: Arc::new(config),
            files,
            locator,
            selector: BackendSelector,
            lifecycle: Arc::new(InitLifecycle::new()),
        }
    }

    /// Eagerly run the one-time backend bootstrap (pool build + schema).
    /// Concurrent callers share a single execution. Absence of a relational
    /// backend is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` if the relational schema is defective
    /// outside self-heal mode.
    pub async fn ensure_initialized(&self) -> Result<(), StoreError> {
        self.backend().await.map(|_| ())
    }

    /// Standalone schema bootstrap for process startup. Returns whether a
    /// relational schema was ensured (`false` means file-only operation).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Schema` on a deployment defect.
    pub async fn ensure_schema(&self) -> Result<bool, StoreError> {
        Ok(self.backend().await?.is_some())
    }

    /// Best-effort cleanup at process shutdown: cancels an in-flight
    /// bootstrap, drains background tasks, closes the pool. Never raises.
    pub async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }

    /// The live pool, if the relational tier is available.
    pub(crate) async fn backend(&self) -> Result<Option<Arc<DbPool>>, StoreError> {
        self.lifecycle.ensure_initialized(&self.config).await
    }

    pub(crate) fn files(&self) -> &FileStore {
        &self.files
    }

    pub(crate) fn locator(&self) -> &ChartLocator {
        &self.locator
    }

    pub(crate) const fn selector(&self) -> BackendSelector {
        self.selector
    }

    pub(crate) fn lifecycle(&self) -> &InitLifecycle {
        &self.lifecycle
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &StelliumConfig {
        &self.config
    }
}
