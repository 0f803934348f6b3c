//! Usage statistics: how many files and bytes have been processed.
//!
//! The record is tiny and read-modify-written on every completed job. A
//! store that cannot be read, or holds garbage, reads as zero; a store that
//! cannot be written logs a warning. Statistics never fail a job.

use crate::config::ENV_STATS_PATH;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// File name of the statistics record in the platform data directory.
pub const STATS_FILE_NAME: &str = "convertx_stats.json";

/// Running totals across every completed job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub files_processed: u64,
    pub bytes_processed: u64,
}

/// Persistence for [`UsageStats`].
///
/// Methods may block on file I/O; the controller records completed jobs
/// through [`DownloadOffer::counted`](crate::DownloadOffer::counted), which
/// runs them on tokio's blocking pool.
pub trait StatsStore: Send + Sync {
    /// Current totals. Zero when nothing usable is stored.
    fn load(&self) -> UsageStats;

    fn save(&self, stats: &UsageStats);

    /// Add one processed file of `bytes` bytes and return the new totals.
    fn record(&self, bytes: u64) -> UsageStats {
        let mut stats = self.load();
        stats.files_processed = stats.files_processed.saturating_add(1);
        stats.bytes_processed = stats.bytes_processed.saturating_add(bytes);
        self.save(&stats);
        stats
    }

    /// Back to zero.
    fn reset(&self) {
        self.save(&UsageStats::default());
    }
}

/// Statistics kept as one JSON file.
#[derive(Debug)]
pub struct JsonFileStats {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonFileStats {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `CONVERTX_STATS_PATH` if set, else `convertx_stats.json` in the
    /// platform data directory (current directory as a last resort).
    pub fn default_location() -> Self {
        let path = std::env::var_os(ENV_STATS_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .map(|d| d.join("convertx"))
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(STATS_FILE_NAME)
            });
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<UsageStats, PersistenceError> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UsageStats::default()),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw).map_err(|source| PersistenceError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, stats: &UsageStats) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_vec(stats)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        // Atomic write: temp file then rename.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        debug!("Saved usage stats to {}", self.path.display());
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StatsStore for JsonFileStats {
    fn load(&self) -> UsageStats {
        let _g = self.guard();
        self.read().unwrap_or_else(|e| {
            warn!("{e}; treating usage stats as zero");
            UsageStats::default()
        })
    }

    fn save(&self, stats: &UsageStats) {
        let _g = self.guard();
        if let Err(e) = self.write(stats) {
            warn!("{e}");
        }
    }

    fn record(&self, bytes: u64) -> UsageStats {
        let _g = self.guard();
        let mut stats = self.read().unwrap_or_else(|e| {
            warn!("{e}; treating usage stats as zero");
            UsageStats::default()
        });
        stats.files_processed = stats.files_processed.saturating_add(1);
        stats.bytes_processed = stats.bytes_processed.saturating_add(bytes);
        if let Err(e) = self.write(&stats) {
            warn!("{e}");
        }
        stats
    }
}

/// In-process statistics, for hosts without persistent storage and tests.
#[derive(Debug, Default)]
pub struct MemoryStats {
    inner: Mutex<UsageStats>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStats {
    fn load(&self) -> UsageStats {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn save(&self, stats: &UsageStats) {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner()) = *stats;
    }

    fn record(&self, bytes: u64) -> UsageStats {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        guard.files_processed = guard.files_processed.saturating_add(1);
        guard.bytes_processed = guard.bytes_processed.saturating_add(bytes);
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStats::new(dir.path().join("stats.json"));
        assert_eq!(store.load(), UsageStats::default());
    }

    #[test]
    fn record_accumulates_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.json");
        let store = JsonFileStats::new(&path);
        store.record(1000);
        store.record(24);

        let reopened = JsonFileStats::new(&path);
        assert_eq!(
            reopened.load(),
            UsageStats {
                files_processed: 2,
                bytes_processed: 1024
            }
        );
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        JsonFileStats::new(&path).record(5);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"filesProcessed\":1"), "got: {raw}");
        assert!(raw.contains("\"bytesProcessed\":5"), "got: {raw}");
    }

    #[test]
    fn corrupt_file_reads_zero_and_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = JsonFileStats::new(&path);
        assert_eq!(store.load(), UsageStats::default());
        let after = store.record(10);
        assert_eq!(after.files_processed, 1);
        assert_eq!(after.bytes_processed, 10);
    }

    #[test]
    fn reset_zeroes() {
        let store = MemoryStats::new();
        store.record(7);
        store.reset();
        assert_eq!(store.load(), UsageStats::default());
    }
}
