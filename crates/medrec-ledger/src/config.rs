use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Flush strategy for the journal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every entry.
    EveryWrite,
    /// Flush to the OS page cache only.
    #[default]
    OsDefault,
}

/// Configuration for a [`RecordLedger`](crate::RecordLedger).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Node identifier stamped into entry timestamps.
    pub node_id: u16,
    /// Journal file. `None` keeps the ledger in memory only.
    pub journal_path: Option<PathBuf>,
    pub sync_mode: SyncMode,
    /// Default time an append waits for the submission channel.
    pub submit_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            node_id: 0,
            journal_path: None,
            sync_mode: SyncMode::default(),
            submit_timeout_ms: 5_000,
        }
    }
}

impl LedgerConfig {
    /// In-memory configuration with defaults.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Journal-backed configuration with defaults.
    pub fn persistent(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: Some(journal_path.into()),
            ..Self::default()
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.submit_timeout_ms == 0 {
            return Err(LedgerError::Config(
                "submit_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(path) = &self.journal_path {
            if path.as_os_str().is_empty() {
                return Err(LedgerError::Config("journal_path must not be empty".into()));
            }
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, LedgerError> {
        let config: Self = toml::from_str(raw).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }
}
