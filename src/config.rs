//! Store configuration.
//!
//! ```toml
//! subscriber_queue_capacity = 1024
//! catchup_batch_size = 512
//! commit_group_size = 1000
//!
//! [storage]
//! type = "sqlite"
//! path = "/var/lib/streamstore/events.db"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Defaults
// =============================================================================

/// Default bound on events queued for one live subscriber before it is
/// moved back to catch-up reading.
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 1024;

/// Default number of backlog events fetched per catch-up read.
pub const DEFAULT_CATCHUP_BATCH_SIZE: usize = 512;

/// Default maximum number of queued appends written in one journal call.
pub const DEFAULT_COMMIT_GROUP_SIZE: usize = 1000;

// =============================================================================
// Config Types
// =============================================================================

/// Configuration for an [`EventStore`](crate::EventStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Capacity of each live subscriber's queue.
    pub subscriber_queue_capacity: usize,

    /// Events read per batch while a subscriber catches up.
    pub catchup_batch_size: usize,

    /// Most appends the group commit writes to the journal at once.
    pub commit_group_size: usize,

    /// Where recorded events are kept.
    pub storage: StorageConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subscriber_queue_capacity: DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            catchup_batch_size: DEFAULT_CATCHUP_BATCH_SIZE,
            commit_group_size: DEFAULT_COMMIT_GROUP_SIZE,
            storage: StorageConfig::InMemory,
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    /// Events live only as long as the process.
    #[default]
    InMemory,
    /// Events are persisted to a SQLite database and recovered on open.
    Sqlite {
        /// Path to the database file (created if missing)
        path: PathBuf,
    },
}

impl StoreConfig {
    /// In-memory config with default tuning.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// SQLite-backed config with default tuning.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig::Sqlite { path: path.into() },
            ..Self::default()
        }
    }

    pub fn with_subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = capacity;
        self
    }

    pub fn with_catchup_batch_size(mut self, size: usize) -> Self {
        self.catchup_batch_size = size;
        self
    }

    pub fn with_commit_group_size(mut self, size: usize) -> Self {
        self.commit_group_size = size;
        self
    }

    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: StoreConfig =
            toml::from_str(source).map_err(|e| Error::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscriber_queue_capacity == 0 {
            return Err(Error::Config(
                "subscriber_queue_capacity must be greater than zero".to_string(),
            ));
        }
        if self.catchup_batch_size == 0 {
            return Err(Error::Config(
                "catchup_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.commit_group_size == 0 {
            return Err(Error::Config(
                "commit_group_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
