use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Largest number of ids the CRM accepts in one batch read.
pub const MAX_BATCH_READ_SIZE: usize = 100;

/// Largest page the CRM search and listing endpoints return.
pub const MAX_PAGE_SIZE: usize = 100;

const fn default_interval_secs() -> u64 {
    120
}

const fn default_lookback_minutes() -> u64 {
    5
}

const fn default_association_concurrency() -> usize {
    16
}

const fn default_batch_read_size() -> usize {
    MAX_BATCH_READ_SIZE
}

const fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}

const fn default_full_sync_on_start() -> bool {
    true
}

/// Cadence and sizing of sync cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Seconds between two incremental passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// How far before the cycle start the change window opens, to absorb clock and
    /// propagation skew.
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u64,
    /// Maximum number of association lookups in flight for one client.
    #[serde(default = "default_association_concurrency")]
    pub association_concurrency: usize,
    #[serde(default = "default_batch_read_size")]
    pub batch_read_size: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Whether the service runs one full pass over every client before the incremental loop.
    #[serde(default = "default_full_sync_on_start")]
    pub full_sync_on_start: bool,
}

impl SyncSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::IntervalZero);
        }

        if self.association_concurrency == 0 {
            return Err(ValidationError::AssociationConcurrencyZero);
        }

        if !(1..=MAX_BATCH_READ_SIZE).contains(&self.batch_read_size) {
            return Err(ValidationError::BatchReadSizeOutOfRange {
                actual: self.batch_read_size,
                max: MAX_BATCH_READ_SIZE,
            });
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ValidationError::PageSizeOutOfRange {
                actual: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }

        Ok(())
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            lookback_minutes: default_lookback_minutes(),
            association_concurrency: default_association_concurrency(),
            batch_read_size: default_batch_read_size(),
            page_size: default_page_size(),
            full_sync_on_start: default_full_sync_on_start(),
        }
    }
}

/// Output format of the service logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
