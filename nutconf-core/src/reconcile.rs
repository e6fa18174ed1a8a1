//! Configuration reconciliation
//!
//! Classifies scan results against the configurations already known for
//! an asset, matches newly discovered configurations to the type catalog,
//! and computes the preference ordering that decides which configuration
//! is materialized to disk.

use std::collections::BTreeMap;
use tracing::warn;

use crate::credentials::{CredentialId, CredentialV1, CredentialV3};
use crate::device::{
    serialize_config, DeviceConfiguration, DeviceConfigurationRow, DeviceConfigurationType,
    KnownConfiguration,
};
use std::collections::BTreeSet;

/// Outcome of diffing a scan against the known configurations.
///
/// The three known buckets are disjoint and together cover every known
/// configuration; `new` holds detected configurations matching none of
/// the known ones.
#[derive(Debug, Default, Clone)]
pub struct ConfigurationUpdate {
    pub working: Vec<KnownConfiguration>,
    pub unknown_state: Vec<KnownConfiguration>,
    pub non_working: Vec<KnownConfiguration>,
    pub new: Vec<DeviceConfiguration>,
}

impl ConfigurationUpdate {
    /// Human-readable dump for the post-scan debug log
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let sections: [(&str, &[KnownConfiguration]); 3] = [
            ("working", &self.working),
            ("unknown-state", &self.unknown_state),
            ("non-working", &self.non_working),
        ];
        for (label, configs) in sections {
            for known in configs {
                out.push_str(label);
                out.push_str(" (row ");
                out.push_str(&known.row_id.to_string());
                out.push_str("):\n");
                out.push_str(&serialize_config("", &known.config));
            }
        }
        for config in &self.new {
            out.push_str("new:\n");
            out.push_str(&serialize_config("", config));
        }
        out
    }
}

/// Rebuild full configurations from persisted rows.
///
/// Each row contributes its type's template, with `${...}` placeholders
/// resolved from the asset and the row's credentials, overlaid with the
/// row's own override attributes. Rows whose type or placeholders cannot
/// be resolved are skipped with a warning; the surviving entries keep
/// their row ids so later status updates address rows directly.
pub fn instantiate_rows(
    rows: &[DeviceConfigurationRow],
    types: &[DeviceConfigurationType],
    asset_name: &str,
    v1: &[CredentialV1],
    v3: &[CredentialV3],
) -> Vec<KnownConfiguration> {
    let mut known = Vec::with_capacity(rows.len());
    'rows: for row in rows {
        let Some(ctype) = types.iter().find(|t| t.id == row.config_type_id) else {
            warn!(
                asset = asset_name,
                row = row.id,
                type_id = row.config_type_id,
                "configuration row references unknown configuration type, skipped"
            );
            continue;
        };

        let mut config = DeviceConfiguration::new();
        for (key, value) in &ctype.template {
            let resolved = if crate::device::is_placeholder(value) {
                match resolve_placeholder(value, asset_name, &row.credential_ids, v1, v3) {
                    Some(resolved) => resolved,
                    None => {
                        warn!(
                            asset = asset_name,
                            row = row.id,
                            placeholder = value.as_str(),
                            "unresolvable template placeholder, row skipped"
                        );
                        continue 'rows;
                    }
                }
            } else {
                value.clone()
            };
            config.set(key.clone(), resolved);
        }
        for (key, value) in &row.attributes {
            config.set(key.clone(), value.clone());
        }
        known.push(KnownConfiguration {
            row_id: row.id,
            config,
        });
    }
    known
}

fn resolve_placeholder(
    placeholder: &str,
    asset_name: &str,
    credential_ids: &BTreeSet<CredentialId>,
    v1: &[CredentialV1],
    v3: &[CredentialV3],
) -> Option<String> {
    let name = &placeholder[2..placeholder.len() - 1];
    match name {
        "asset.name" => Some(asset_name.to_string()),
        "credential.community" => v1
            .iter()
            .find(|c| credential_ids.contains(&c.id))
            .map(|c| c.community.clone()),
        "credential.secName" => v3
            .iter()
            .find(|c| credential_ids.contains(&c.id))
            .map(|c| c.user.clone()),
        "credential.authPassword" => v3
            .iter()
            .find(|c| credential_ids.contains(&c.id))
            .and_then(|c| c.auth_password.clone()),
        "credential.privPassword" => v3
            .iter()
            .find(|c| credential_ids.contains(&c.id))
            .and_then(|c| c.priv_password.clone()),
        _ => None,
    }
}

/// Diff a scan result against the known configurations.
///
/// Partial-scan policy: a scan yielding zero candidates across all
/// attempted protocols means the asset was unreachable, so every known
/// configuration lands in `unknown_state` and nothing is flipped on that
/// evidence. With at least one candidate, each known configuration is
/// `working` if some detected configuration covers its identifying
/// attributes and `non_working` otherwise.
pub fn compute_update(
    known: &[KnownConfiguration],
    detected: &[DeviceConfiguration],
) -> ConfigurationUpdate {
    let mut update = ConfigurationUpdate::default();

    if detected.is_empty() {
        update.unknown_state = known.to_vec();
        return update;
    }

    for entry in known {
        if detected.iter().any(|d| entry.config.is_subset_of(d)) {
            update.working.push(entry.clone());
        } else {
            update.non_working.push(entry.clone());
        }
    }

    for candidate in detected {
        let matches_known = known.iter().any(|entry| entry.config.is_subset_of(candidate));
        if !matches_known && !update.new.contains(candidate) {
            update.new.push(candidate.clone());
        }
    }

    update
}

/// Match a detected configuration to the best catalog type.
///
/// Highest specificity (most template attributes matched) wins; ties go
/// to the earliest catalog entry. `None` means the configuration matches
/// no known family and must be discarded, never guessed.
pub fn match_configuration_type<'a>(
    config: &DeviceConfiguration,
    types: &'a [DeviceConfigurationType],
) -> Option<&'a DeviceConfigurationType> {
    let mut best: Option<(&DeviceConfigurationType, usize)> = None;
    for ctype in types {
        if let Some(specificity) = ctype.specificity_for(config) {
            if best.map_or(true, |(_, s)| specificity > s) {
                best = Some((ctype, specificity));
            }
        }
    }
    best.map(|(ctype, _)| ctype)
}

/// Extract the attributes to persist for a new configuration: everything
/// the matched type's template does not already provide. Template-covered
/// keys (literals and placeholders alike) are rebuilt at instantiation
/// time, credential-backed values from the credential store.
pub fn attributes_from_configuration(
    config: &DeviceConfiguration,
    ctype: &DeviceConfigurationType,
) -> BTreeMap<String, String> {
    config
        .iter()
        .filter(|(key, _)| !ctype.template.contains_key(*key) && key.as_str() != "name")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Preference rank of a configuration's driver; lower is better
fn driver_preference(config: &DeviceConfiguration) -> usize {
    match config.get("driver").unwrap_or("") {
        "snmp-ups" => {
            if config.get("snmp_version") == Some("v3") {
                0
            } else {
                1
            }
        }
        "netxml-ups" => 2,
        "usbhid-ups" => 3,
        "mge-shut" | "blazer_ser" => 4,
        _ => 5,
    }
}

/// Compute the preferred priority order for an asset's configurations.
///
/// Returns the row ids sorted by driver preference; the sort is stable,
/// so rows of equal preference keep their original query order.
pub fn sort_preferred(known: &[KnownConfiguration]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..known.len()).collect();
    order.sort_by_key(|&i| driver_preference(&known[i].config));
    order.into_iter().map(|i| known[i].row_id).collect()
}
