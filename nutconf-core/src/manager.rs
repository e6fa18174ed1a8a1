//! Configuration manager
//!
//! Aggregate root of the reconciliation engine. Owns the authoritative
//! in-memory cache (asset name → active configurations and credential
//! ids in use), drives scan/reconcile/persist cycles, materializes the
//! winning configuration to disk, and enqueues driver start/stop actions.
//!
//! Locking: the cache mutex guards map access only — never a scan, a
//! store call, or file I/O. Callers serialize whole operations per asset
//! name through [`crate::protect::AssetProtect`].

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use nutconf_error::Result;
use nutconf_protocol::AssetStatus;

use crate::credentials::{match_credential_ids, CredentialId, CredentialProvider};
use crate::device::{
    read_device_config, remove_device_config, serialize_config, write_device_config,
    DeviceConfiguration,
};
use crate::drivers::{driver_unit, DriverLifecycle};
use crate::protect::AssetProtect;
use crate::reconcile::{
    attributes_from_configuration, compute_update, instantiate_rows, match_configuration_type,
    sort_preferred,
};
use crate::scan::ScanOrchestrator;
use crate::settings::EngineSettings;
use crate::store::ConfigStore;

/// Process-wide authoritative state, keyed by asset name.
///
/// Invariant: an asset is present iff at least one active configuration
/// is currently believed valid for it; both sub-maps are replaced
/// wholesale on every successful update.
#[derive(Default)]
struct AssetCache {
    configurations: HashMap<String, Vec<DeviceConfiguration>>,
    credentials: HashMap<String, BTreeSet<CredentialId>>,
}

/// Compare candidate configurations against the cached ones.
///
/// During initialization only the first candidate of each side is
/// compared (either side being empty counts as a change): checking just
/// the top candidate keeps agent startup from turning into a rescan
/// storm. Outside initialization the full lists are compared, length
/// first, then element-wise in original order.
pub fn is_configurations_change(
    to_test: &[DeviceConfiguration],
    current: &[DeviceConfiguration],
    init_in_progress: bool,
) -> bool {
    if init_in_progress {
        return match (to_test.first(), current.first()) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        };
    }
    if to_test.len() != current.len() {
        return true;
    }
    for (a, b) in to_test.iter().zip(current.iter()) {
        if a != b {
            trace!(
                current = %serialize_config("", b),
                test = %serialize_config("", a),
                "configuration mismatch"
            );
            return true;
        }
    }
    false
}

pub struct ConfigurationManager {
    store: Arc<dyn ConfigStore>,
    credentials: Arc<dyn CredentialProvider>,
    scanner: ScanOrchestrator,
    drivers: Arc<DriverLifecycle>,
    protect: Arc<AssetProtect>,
    device_dir: PathBuf,
    cache: Mutex<AssetCache>,
}

impl ConfigurationManager {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        credentials: Arc<dyn CredentialProvider>,
        scanner: ScanOrchestrator,
        drivers: Arc<DriverLifecycle>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            store,
            credentials,
            scanner,
            drivers,
            protect: Arc::new(AssetProtect::new()),
            device_dir: settings.device_dir.clone(),
            cache: Mutex::new(AssetCache::default()),
        }
    }

    /// The per-asset serialization lock registry, shared with callers
    pub fn protect(&self) -> Arc<AssetProtect> {
        Arc::clone(&self.protect)
    }

    /// Cached active configurations for an asset, if any
    pub fn cached_configurations(&self, asset_name: &str) -> Option<Vec<DeviceConfiguration>> {
        self.cache.lock().configurations.get(asset_name).cloned()
    }

    /// Cached credential ids in use by an asset, if any
    pub fn cached_credentials(&self, asset_name: &str) -> Option<BTreeSet<CredentialId>> {
        self.cache.lock().credentials.get(asset_name).cloned()
    }

    /// Scan an asset and update the driver configuration rows in the store.
    ///
    /// Workflow: instantiate the known rows, probe the device, classify
    /// the results, flip working flags for configurations with evidence
    /// either way (unknown-state rows are left untouched), and persist
    /// newly discovered configurations matched to a catalog type.
    pub fn scan_asset_configurations(&self, asset_name: &str) -> Result<()> {
        let v1 = self.credentials.credentials_snmpv1()?;
        let v3 = self.credentials.credentials_snmpv3()?;
        let rows = self.store.list_configurations(asset_name)?;
        let types = self.store.list_configuration_types()?;
        let known = instantiate_rows(&rows, &types, asset_name, &v1, &v3);

        let detected = self.scanner.scan(asset_name, &v1, &v3);
        let update = compute_update(&known, &detected);
        debug!(
            asset = asset_name,
            "configuration summary after scan:\n{}",
            update.summary()
        );

        for (entries, working) in [(&update.working, true), (&update.non_working, false)] {
            for entry in entries {
                self.store.set_configuration_working(entry.row_id, working)?;
                info!(
                    asset = asset_name,
                    row = entry.row_id,
                    working,
                    "marked device configuration"
                );
            }
        }

        for config in &update.new {
            let Some(ctype) = match_configuration_type(config, &types) else {
                warn!(
                    asset = asset_name,
                    "detected configuration matches no configuration type, discarded:\n{}",
                    serialize_config("", config)
                );
                continue;
            };
            let attributes = attributes_from_configuration(config, ctype);
            let credential_ids = match_credential_ids(config, &v1, &v3);
            let row_id = self.store.insert_configuration(
                asset_name,
                ctype.id,
                true,
                true,
                &credential_ids,
                &attributes,
            )?;
            info!(
                asset = asset_name,
                row = row_id,
                config_type = ctype.pretty_name.as_str(),
                driver = config.get("driver").unwrap_or("?"),
                "persisted newly discovered device configuration"
            );
        }

        Ok(())
    }

    /// Reorder the asset's configuration priorities by driver preference
    pub fn sort_asset_priorities(&self, asset_name: &str) -> Result<()> {
        let v1 = self.credentials.credentials_snmpv1()?;
        let v3 = self.credentials.credentials_snmpv3()?;
        let rows = self.store.list_configurations(asset_name)?;
        let types = self.store.list_configuration_types()?;
        let known = instantiate_rows(&rows, &types, asset_name, &v1, &v3);

        let ordered = sort_preferred(&known);
        self.store.set_configuration_priorities(asset_name, &ordered)
    }

    /// Candidate configurations for an asset (working + active, priority
    /// order) together with the union of their credential ids.
    pub fn fetch_candidate_configurations(
        &self,
        asset_name: &str,
    ) -> Result<(Vec<DeviceConfiguration>, BTreeSet<CredentialId>)> {
        let rows = self.store.list_candidate_configurations(asset_name)?;
        debug!(asset = asset_name, candidates = rows.len(), "fetched candidates");
        if rows.is_empty() {
            return Ok((Vec::new(), BTreeSet::new()));
        }

        let v1 = self.credentials.credentials_snmpv1()?;
        let v3 = self.credentials.credentials_snmpv3()?;
        let types = self.store.list_configuration_types()?;
        let known = instantiate_rows(&rows, &types, asset_name, &v1, &v3);

        let credential_ids = rows
            .iter()
            .flat_map(|row| row.credential_ids.iter().cloned())
            .collect();
        Ok((known.into_iter().map(|k| k.config).collect(), credential_ids))
    }

    /// Replace the cache entry for an asset.
    ///
    /// An empty configuration list is ignored: the cache only ever holds
    /// assets with at least one active configuration.
    pub fn save_asset_configurations(
        &self,
        asset_name: &str,
        configs: Vec<DeviceConfiguration>,
        credential_ids: BTreeSet<CredentialId>,
    ) {
        if configs.is_empty() {
            return;
        }
        let mut cache = self.cache.lock();
        cache
            .configurations
            .insert(asset_name.to_string(), configs);
        cache
            .credentials
            .insert(asset_name.to_string(), credential_ids);
    }

    /// Materialize the current candidates: update the cache, write the
    /// highest-priority configuration to the driver file, and queue a
    /// driver start when the file actually changed.
    ///
    /// Returns whether the file was written; an unchanged winner is a
    /// complete no-op (no restart, no notification).
    pub fn apply_asset_configuration(&self, asset_name: &str) -> Result<bool> {
        let (configs, credential_ids) = self.fetch_candidate_configurations(asset_name)?;
        let Some(first) = configs.first().cloned() else {
            debug!(asset = asset_name, "no candidate configuration to apply");
            return Ok(false);
        };

        self.save_asset_configurations(asset_name, configs, credential_ids);

        trace!(
            asset = asset_name,
            "saving configuration:\n{}",
            serialize_config("", &first)
        );
        let written = write_device_config(&self.device_dir, asset_name, &first)?;
        if written {
            self.drivers.request_start(&driver_unit(asset_name));
        }
        Ok(written)
    }

    /// Rebuild one asset's state at agent startup.
    ///
    /// The previous run's configuration file is the only surviving
    /// evidence of what was applied. It is compared against the current
    /// top candidate with the cheap first-candidate init check; a match
    /// adopts the stored candidates into the cache without probing the
    /// device, anything else runs the full scan pipeline. Returns whether
    /// the configuration file was rewritten.
    pub fn init_asset_configuration(&self, asset_name: &str) -> Result<bool> {
        let applied: Vec<DeviceConfiguration> = read_device_config(&self.device_dir, asset_name)?
            .into_iter()
            .collect();
        let (candidates, credential_ids) = self.fetch_candidate_configurations(asset_name)?;

        // the file carries an injected name attribute; mirror it before comparing
        let expected: Vec<DeviceConfiguration> = candidates
            .first()
            .map(|config| {
                let mut config = config.clone();
                config.set("name", asset_name);
                config
            })
            .into_iter()
            .collect();

        if !is_configurations_change(&expected, &applied, true) {
            debug!(
                asset = asset_name,
                "stored candidate matches the applied file, adopted without rescan"
            );
            self.save_asset_configurations(asset_name, candidates, credential_ids);
            return Ok(false);
        }

        info!(asset = asset_name, "applied file out of date, running full pipeline");
        self.scan_asset_configurations(asset_name)?;
        self.sort_asset_priorities(asset_name)?;
        self.apply_asset_configuration(asset_name)
    }

    /// React to an asset update notification.
    ///
    /// Decides from the cache and the current candidates whether anything
    /// material changed; only then runs the scan → sort → apply pipeline
    /// (or tears the asset down when it went nonactive). Returns whether
    /// a configuration was written or removed.
    pub fn update_asset_configuration(
        &self,
        asset_name: &str,
        status: AssetStatus,
    ) -> Result<bool> {
        let cached = self.cached_configurations(asset_name);

        let need_update = match (&cached, status) {
            (None, AssetStatus::Active) => true,
            (None, AssetStatus::Nonactive) => false,
            (Some(_), AssetStatus::Nonactive) => true,
            (Some(cached), AssetStatus::Active) => {
                let (current, _) = self.fetch_candidate_configurations(asset_name)?;
                is_configurations_change(cached, &current, false)
            }
        };
        if !need_update {
            debug!(asset = asset_name, "no configuration change, nothing to do");
            return Ok(false);
        }

        info!(asset = asset_name, "configuration update needed");
        match status {
            AssetStatus::Active => {
                self.scan_asset_configurations(asset_name)?;
                self.sort_asset_priorities(asset_name)?;
                self.apply_asset_configuration(asset_name)
            }
            AssetStatus::Nonactive => self.remove_asset_configuration(asset_name),
        }
    }

    /// Tear down an asset: drop the cache entry, delete the driver file,
    /// and queue a driver stop.
    pub fn remove_asset_configuration(&self, asset_name: &str) -> Result<bool> {
        info!(asset = asset_name, "removing asset configuration");
        {
            let mut cache = self.cache.lock();
            cache.configurations.remove(asset_name);
            cache.credentials.remove(asset_name);
        }
        remove_device_config(&self.device_dir, asset_name)?;
        self.drivers.request_stop(&driver_unit(asset_name));
        Ok(true)
    }

    /// React to a credential-store change: find every cached asset
    /// referencing the credential and re-validate each one through the
    /// full pipeline when its candidates changed.
    ///
    /// Returns the assets whose configuration materially changed, for the
    /// caller to notify. Per-asset failures are logged and isolated.
    pub fn manage_credentials_configuration(
        &self,
        credential_id: &CredentialId,
    ) -> Result<BTreeSet<String>> {
        let affected: Vec<String> = {
            let cache = self.cache.lock();
            cache
                .credentials
                .iter()
                .filter(|(_, ids)| ids.contains(credential_id))
                .map(|(name, _)| name.clone())
                .collect()
        };
        for asset_name in &affected {
            info!(
                credential = %credential_id,
                asset = asset_name.as_str(),
                "credential referenced by cached asset"
            );
        }

        let mut changed = BTreeSet::new();
        for asset_name in affected {
            let lock = self.protect.acquire(&asset_name);
            let _guard = lock.lock();

            match self.revalidate_asset(&asset_name) {
                Ok(true) => {
                    changed.insert(asset_name);
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        asset = asset_name.as_str(),
                        error = %e,
                        "credential re-validation failed, asset skipped"
                    );
                }
            }
        }
        Ok(changed)
    }

    /// Re-check one asset after a credential change; rescan and reapply
    /// only when its candidate configurations no longer match the cache.
    fn revalidate_asset(&self, asset_name: &str) -> Result<bool> {
        let Some(cached) = self.cached_configurations(asset_name) else {
            return Ok(false);
        };
        let (current, _) = self.fetch_candidate_configurations(asset_name)?;
        if !is_configurations_change(&cached, &current, false) {
            return Ok(false);
        }

        info!(asset = asset_name, "credential change requires rescan");
        self.scan_asset_configurations(asset_name)?;
        self.sort_asset_priorities(asset_name)?;
        self.apply_asset_configuration(asset_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> DeviceConfiguration {
        DeviceConfiguration::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_init_diff_checks_first_candidate_only() {
        let snmp = config(&[("driver", "snmp-ups"), ("port", "10.0.0.5")]);
        let usb = config(&[("driver", "usbhid-ups")]);
        let xml = config(&[("driver", "netxml-ups")]);

        // identical first candidates: unchanged, even with a differing tail
        assert!(!is_configurations_change(
            &[snmp.clone()],
            &[snmp.clone(), usb.clone()],
            true
        ));
        // differing first candidates
        assert!(is_configurations_change(
            &[xml.clone()],
            &[snmp.clone()],
            true
        ));
        // either side empty counts as a change during init
        assert!(is_configurations_change(&[], &[snmp.clone()], true));
        assert!(is_configurations_change(&[snmp.clone()], &[], true));
    }

    #[test]
    fn test_full_diff_compares_lengths_then_elements() {
        let snmp = config(&[("driver", "snmp-ups"), ("port", "10.0.0.5")]);
        let usb = config(&[("driver", "usbhid-ups")]);

        assert!(is_configurations_change(
            &[snmp.clone()],
            &[snmp.clone(), usb.clone()],
            false
        ));
        assert!(!is_configurations_change(
            &[snmp.clone(), usb.clone()],
            &[snmp.clone(), usb.clone()],
            false
        ));
        assert!(is_configurations_change(
            &[snmp.clone(), usb.clone()],
            &[usb.clone(), snmp.clone()],
            false
        ));
        assert!(!is_configurations_change(&[], &[], false));
    }
}
