//! On-disk driver configuration files
//!
//! One file per asset under the device directory, containing exactly the
//! winning configuration plus an injected `name` attribute. Writes are
//! idempotent: content-identical updates touch nothing, because every
//! real write implies a disruptive driver restart downstream.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use nutconf_error::{NutConfError, Result};

use super::codec::{parse_config, serialize_config};
use super::types::DeviceConfiguration;

/// Path of the driver configuration file for an asset
pub fn device_config_path(dir: &Path, asset_name: &str) -> PathBuf {
    dir.join(asset_name)
}

/// Write the winning configuration for an asset.
///
/// Injects `name = <asset>` and compares against the current file
/// content first. Returns `true` only when the file was actually
/// (re)written.
pub fn write_device_config(
    dir: &Path,
    asset_name: &str,
    config: &DeviceConfiguration,
) -> Result<bool> {
    fs::create_dir_all(dir).map_err(|source| NutConfError::FileWrite {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut config = config.clone();
    config.set("name", asset_name);
    let new_content = serialize_config(asset_name, &config);

    let path = device_config_path(dir, asset_name);
    let old_content = fs::read_to_string(&path).unwrap_or_default();
    if old_content == new_content {
        info!(asset = asset_name, "configuration file unchanged, no actions to perform");
        return Ok(false);
    }

    info!(asset = asset_name, path = %path.display(), "configuration file outdated, writing new one");
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, &new_content).map_err(|source| NutConfError::FileWrite {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, &path).map_err(|source| NutConfError::FileWrite {
        path: path.clone(),
        source,
    })?;
    Ok(true)
}

/// Read an asset's driver configuration file, if present
pub fn read_device_config(dir: &Path, asset_name: &str) -> Result<Option<DeviceConfiguration>> {
    let path = device_config_path(dir, asset_name);
    match fs::read_to_string(&path) {
        Ok(text) => Ok(Some(parse_config(&text))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(NutConfError::FileRead { path, source }),
    }
}

/// Remove an asset's driver configuration file.
///
/// Returns `false` when there was nothing to remove.
pub fn remove_device_config(dir: &Path, asset_name: &str) -> Result<bool> {
    let path = device_config_path(dir, asset_name);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!(asset = asset_name, path = %path.display(), "removed configuration file");
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(asset = asset_name, "no configuration file to remove");
            Ok(false)
        }
        Err(source) => Err(NutConfError::FileWrite { path, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config() -> DeviceConfiguration {
        DeviceConfiguration::from_pairs([
            ("driver", "snmp-ups"),
            ("port", "10.0.0.5"),
            ("community", "public"),
        ])
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = TempDir::new().unwrap();
        let written = write_device_config(dir.path(), "ups-1", &sample_config()).unwrap();
        assert!(written);

        let text = fs::read_to_string(device_config_path(dir.path(), "ups-1")).unwrap();
        assert_eq!(
            text,
            "[ups-1]\ncommunity = \"public\"\ndriver = \"snmp-ups\"\nname = \"ups-1\"\nport = \"10.0.0.5\"\n"
        );

        let read = read_device_config(dir.path(), "ups-1").unwrap().unwrap();
        assert_eq!(read.get("name"), Some("ups-1"));
        assert_eq!(read.get("driver"), Some("snmp-ups"));
    }

    #[test]
    fn test_second_identical_write_is_noop() {
        let dir = TempDir::new().unwrap();
        let config = sample_config();
        assert!(write_device_config(dir.path(), "ups-1", &config).unwrap());

        let path = device_config_path(dir.path(), "ups-1");
        let mtime = fs::metadata(&path).unwrap().modified().unwrap();
        let content = fs::read_to_string(&path).unwrap();

        assert!(!write_device_config(dir.path(), "ups-1", &config).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn test_changed_config_rewrites_file() {
        let dir = TempDir::new().unwrap();
        assert!(write_device_config(dir.path(), "ups-1", &sample_config()).unwrap());

        let mut changed = sample_config();
        changed.set("community", "private");
        assert!(write_device_config(dir.path(), "ups-1", &changed).unwrap());

        let read = read_device_config(dir.path(), "ups-1").unwrap().unwrap();
        assert_eq!(read.get("community"), Some("private"));
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        write_device_config(dir.path(), "ups-1", &sample_config()).unwrap();

        assert!(remove_device_config(dir.path(), "ups-1").unwrap());
        assert!(!device_config_path(dir.path(), "ups-1").exists());
        // second removal is a clean no-op
        assert!(!remove_device_config(dir.path(), "ups-1").unwrap());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_device_config(dir.path(), "absent").unwrap().is_none());
    }
}
