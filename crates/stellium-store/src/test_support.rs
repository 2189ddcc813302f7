//! Shared test utilities for stellium-store tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::path::Path;

    use stellium_config::StelliumConfig;

    use crate::service::StelliumStore;

    /// Config with only the file tier: data dir under the given temp dir,
    /// no relational backend.
    pub fn file_only_config(dir: &Path) -> StelliumConfig {
        let mut config = StelliumConfig::default();
        config.storage.data_dir = dir.join("data").to_string_lossy().into_owned();
        config
    }

    /// Config with a local relational backend alongside the file tier.
    pub fn relational_config(dir: &Path) -> StelliumConfig {
        let mut config = file_only_config(dir);
        config.database.path = dir.join("stellium.db").to_string_lossy().into_owned();
        config
    }

    /// Store with no relational backend configured.
    pub fn file_store(dir: &Path) -> StelliumStore {
        StelliumStore::new(file_only_config(dir))
    }

    /// Store backed by a local database file.
    pub fn relational_store(dir: &Path) -> StelliumStore {
        StelliumStore::new(relational_config(dir))
    }
}
