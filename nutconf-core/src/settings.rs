//! Engine settings
//!
//! Persistent settings stored as JSON, with defaults from
//! [`crate::constants`]. Missing fields fall back individually so old
//! settings files keep working after upgrades.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nutconf_error::{NutConfError, Result};

use crate::constants::{drivers, paths, scan, workers};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Directory holding one driver configuration file per asset
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,
    /// Shared probe budget across all in-flight scans
    #[serde(default = "default_scanner_pool_size")]
    pub scanner_pool_size: usize,
    /// Pool size for offloaded notification handlers
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    /// Upper bound for a single protocol probe, in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Upper bound for aggregating one asset's scan, in seconds
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    /// Cadence of the driver start/stop batch loop, in seconds
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
}

fn default_device_dir() -> PathBuf {
    PathBuf::from(paths::DEVICE_CONFIG_DIR)
}

fn default_scanner_pool_size() -> usize {
    scan::SCANNER_POOL_SIZE
}

fn default_worker_pool_size() -> usize {
    workers::NOTIFICATION_POOL_SIZE
}

fn default_probe_timeout_secs() -> u64 {
    scan::PROBE_TIMEOUT_SECS
}

fn default_scan_timeout_secs() -> u64 {
    scan::SCAN_TIMEOUT_SECS
}

fn default_drain_interval_secs() -> u64 {
    drivers::DRAIN_INTERVAL_SECS
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            scanner_pool_size: default_scanner_pool_size(),
            worker_pool_size: default_worker_pool_size(),
            probe_timeout_secs: default_probe_timeout_secs(),
            scan_timeout_secs: default_scan_timeout_secs(),
            drain_interval_secs: default_drain_interval_secs(),
        }
    }
}

impl EngineSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }
}

/// Load settings from a JSON file
pub fn load_settings(path: &Path) -> Result<EngineSettings> {
    let text = fs::read_to_string(path).map_err(|source| NutConfError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Load settings from `path`, falling back to defaults when the file
/// does not exist. A present but malformed file is still an error.
pub fn load_settings_or_default(path: &Path) -> Result<EngineSettings> {
    if !path.exists() {
        return Ok(EngineSettings::default());
    }
    load_settings(path)
}

/// Load settings from the default system location
/// ([`paths::SETTINGS_FILE`]). Fresh installs without a settings file
/// run on defaults.
pub fn load_default_settings() -> Result<EngineSettings> {
    load_settings_or_default(Path::new(paths::SETTINGS_FILE))
}
