//! Constants and configuration defaults for nutconf
//!
//! Centralizes paths, pool sizes, and timing values used across the engine.

/// System paths
pub mod paths {
    /// Directory holding one driver configuration file per asset
    pub const DEVICE_CONFIG_DIR: &str = "/var/lib/nutconf/devices";

    /// Engine settings file
    pub const SETTINGS_FILE: &str = "/etc/nutconf/settings.json";
}

/// Scanning limits and timing
pub mod scan {
    /// Concurrent probe budget shared across all in-flight asset scans
    pub const SCANNER_POOL_SIZE: usize = 20;

    /// Upper bound for a single protocol probe
    pub const PROBE_TIMEOUT_SECS: u64 = 10;

    /// Upper bound for aggregating all probes of one asset
    pub const SCAN_TIMEOUT_SECS: u64 = 60;
}

/// Notification handling
pub mod workers {
    /// Pool size for offloaded notification and request handlers
    pub const NOTIFICATION_POOL_SIZE: usize = 10;
}

/// Driver service batching
pub mod drivers {
    /// Cadence of the background start/stop drain loop
    pub const DRAIN_INTERVAL_SECS: u64 = 2;

    /// systemd template instantiated per asset
    pub const UNIT_PREFIX: &str = "nut-driver@";
}

/// Configuration matching
pub mod matching {
    /// Attributes ignored when testing whether a detected configuration
    /// covers a known one (they identify the asset, not the protocol).
    pub const NON_IDENTIFYING_ATTRIBUTES: &[&str] = &["name", "desc"];
}
