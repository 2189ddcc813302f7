//! Relational backend configuration.

use serde::{Deserialize, Serialize};

/// Default minimum pool size.
const fn default_min_connections() -> u32 {
    1
}

/// Default maximum pool size.
const fn default_max_connections() -> u32 {
    4
}

/// Default bound on pool close, in seconds.
const fn default_close_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Remote database URL (e.g., `libsql://stellium-prod.turso.io`).
    /// Empty means no remote backend.
    #[serde(default)]
    pub url: String,

    /// Auth token for the remote backend.
    #[serde(default)]
    pub auth_token: String,

    /// Local database file path (e.g., `.stellium/stellium.db`, or `:memory:`
    /// for tests). Empty means no local backend. Ignored when `url` is set.
    #[serde(default)]
    pub path: String,

    /// Connections opened eagerly when the pool is built.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Upper bound on concurrently checked-out connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long `close()` waits for outstanding connections before forcing
    /// shutdown.
    #[serde(default = "default_close_timeout_secs")]
    pub close_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            auth_token: String::new(),
            path: String::new(),
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            close_timeout_secs: default_close_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Whether any relational backend is configured at all. When false the
    /// store runs file-only and never attempts a pool.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() || !self.path.is_empty()
    }

    /// Whether the configured backend is a remote URL (vs. a local file).
    #[must_use]
    pub fn is_remote(&self) -> bool {
        !self.url.is_empty()
    }
}
