use crate::core::{LogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted retention or maintenance interval. Keeps expiry
/// arithmetic inside chrono's date range.
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Log configuration
///
/// Plain data, loadable from JSON. Collaborators (clock, metrics, transport)
/// are attached through [`LogBuilder`](super::LogBuilder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// How long an entry lives after it was written
    pub retention_ms: u64,

    /// Where snapshots are restored from and written to
    pub snapshot_file: Option<PathBuf>,

    /// Period of the GC + snapshot cycle
    pub maintenance_interval_ms: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_ms: 120 * 60 * 60 * 1000, // 5 days
            snapshot_file: None,
            maintenance_interval_ms: 15 * 60 * 1000,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retention period
    pub fn retention(mut self, retention: Duration) -> Self {
        self.retention_ms = retention.as_millis() as u64;
        self
    }

    /// Set the snapshot file
    pub fn snapshot_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.snapshot_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the maintenance interval
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn retention_duration(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn maintenance_interval_duration(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.retention_ms == 0 {
            return Err(LogError::InvalidArgument(
                "retention must be greater than zero".to_string(),
            ));
        }
        if self.retention_duration() > MAX_DURATION {
            return Err(LogError::InvalidArgument(format!(
                "retention of {} ms exceeds the maximum of {} ms",
                self.retention_ms,
                MAX_DURATION.as_millis()
            )));
        }
        if self.maintenance_interval_duration() > MAX_DURATION {
            return Err(LogError::InvalidArgument(format!(
                "maintenance interval of {} ms exceeds the maximum of {} ms",
                self.maintenance_interval_ms,
                MAX_DURATION.as_millis()
            )));
        }
        Ok(())
    }

    /// Parse a configuration from JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LogConfig = serde_json::from_str(json)
            .map_err(|e| LogError::InvalidArgument(format!("Invalid log config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}
