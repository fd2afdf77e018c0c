//! Store configuration: journaling, retry policy and cache settings.

use serde::{Deserialize, Serialize};

/// SQLite journal mode applied to file-backed stores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Write-ahead log: readers proceed while a single writer appends.
    #[default]
    Wal,
    Delete,
    Truncate,
    Memory,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Durability level (`PRAGMA synchronous`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLevel {
    Off,
    #[default]
    Normal,
    Full,
    Extra,
}

impl SyncLevel {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            SyncLevel::Off => "OFF",
            SyncLevel::Normal => "NORMAL",
            SyncLevel::Full => "FULL",
            SyncLevel::Extra => "EXTRA",
        }
    }
}

/// Journaling options.
///
/// # Default Configuration
///
/// ```rust
/// use relgraph::{JournalConfig, JournalMode, SyncLevel};
/// let config = JournalConfig::default();
/// assert_eq!(config.mode, JournalMode::Wal);
/// assert_eq!(config.synchronous, SyncLevel::Normal);
/// assert_eq!(config.wal_autocheckpoint_pages, 1000);
/// assert_eq!(config.busy_timeout_ms, 5000);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub mode: JournalMode,
    pub synchronous: SyncLevel,
    /// WAL pages written before SQLite checkpoints automatically.
    pub wal_autocheckpoint_pages: u32,
    /// How long SQLite itself waits on a lock before reporting busy.
    pub busy_timeout_ms: u64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            mode: JournalMode::Wal,
            synchronous: SyncLevel::Normal,
            wal_autocheckpoint_pages: 1000,
            busy_timeout_ms: 5000,
        }
    }
}

/// Busy-retry policy: retry `n` waits `initial_delay_ms * 2^n`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 10,
        }
    }
}

/// Complete configuration for opening a [`crate::GraphStore`].
///
/// ```rust
/// use relgraph::GraphConfig;
///
/// let cfg: GraphConfig = serde_json::from_str(r#"{"retry": {"max_retries": 2}}"#).unwrap();
/// assert_eq!(cfg.retry.max_retries, 2);
/// assert_eq!(cfg.retry.initial_delay_ms, 10);
/// assert!(cfg.adjacency_cache);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub journal: JournalConfig,
    pub retry: RetryPolicy,
    pub statement_cache_capacity: usize,
    pub adjacency_cache: bool,
    /// Depth bound used by traversals that set none.
    pub traversal_default_max_depth: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            journal: JournalConfig::default(),
            retry: RetryPolicy::default(),
            statement_cache_capacity: 128,
            adjacency_cache: true,
            traversal_default_max_depth: 10,
        }
    }
}
