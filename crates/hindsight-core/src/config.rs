//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};

/// Metadata keys and values are capped at this many UTF-8 code units.
pub const METADATA_MAX_LEN: usize = 255;

/// Maximum number of distinct metadata keys per record.
pub const METADATA_MAX_KEYS: usize = 100;

/// Configuration for the mirror store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Page size applied when a scan caller passes no limit.
    /// Default: 1000.
    pub default_page_size: Option<usize>,
    /// Hard ceiling on any scan page, regardless of the caller-supplied
    /// value. Default: 10_000.
    pub max_page_size: Option<usize>,
    /// Bounded retry budget for commits that hit a transient busy
    /// failure. Default: 3.
    pub commit_retries: Option<u32>,
    /// SQLite busy timeout in milliseconds. Default: 5000.
    pub busy_timeout_ms: Option<u32>,
    /// Number of read-only connections in the pool. Default: 4.
    pub read_pool_size: Option<usize>,
}

impl StoreConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StoreError::InvalidState {
            reason: format!("config parse: {e}"),
        })
    }

    pub fn effective_default_page_size(&self) -> usize {
        self.default_page_size.unwrap_or(1000)
    }

    pub fn effective_max_page_size(&self) -> usize {
        self.max_page_size.unwrap_or(10_000)
    }

    pub fn effective_commit_retries(&self) -> u32 {
        self.commit_retries.unwrap_or(3)
    }

    pub fn effective_busy_timeout_ms(&self) -> u32 {
        self.busy_timeout_ms.unwrap_or(5000)
    }

    pub fn effective_read_pool_size(&self) -> usize {
        self.read_pool_size.unwrap_or(4).max(1)
    }

    /// Clamp a caller-supplied limit to the server-side ceiling,
    /// applying the default when none is given. An explicit zero is
    /// honored: the scan returns an empty page rather than a row the
    /// caller did not ask for.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or_else(|| self.effective_default_page_size())
            .min(self.effective_max_page_size())
    }
}
