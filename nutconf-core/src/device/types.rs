//! Core data types for driver configurations
//!
//! A driver configuration is an ordered set of unique string attributes
//! (driver, port, community, ...). Equality is attribute-set equality,
//! independent of how the attributes were produced.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::matching;
use crate::credentials::CredentialId;

/// One candidate driver invocation for a device.
///
/// Attributes are kept in a key-ordered map so serialization and
/// comparison are deterministic regardless of discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfiguration {
    attributes: BTreeMap<String, String>,
}

impl DeviceConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from key/value pairs
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let attributes = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self { attributes }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.attributes.iter()
    }

    /// Whether every identifying attribute of `self` is present with the
    /// same value in `candidate`.
    ///
    /// Non-identifying attributes (see
    /// [`matching::NON_IDENTIFYING_ATTRIBUTES`]) are skipped: a scan
    /// result never carries them, yet a persisted configuration may.
    pub fn is_subset_of(&self, candidate: &DeviceConfiguration) -> bool {
        self.attributes
            .iter()
            .filter(|(key, _)| !matching::NON_IDENTIFYING_ATTRIBUTES.contains(&key.as_str()))
            .all(|(key, value)| candidate.get(key) == Some(value.as_str()))
    }
}

/// Whether a template value is a `${...}` substitution marker
pub(crate) fn is_placeholder(value: &str) -> bool {
    value.starts_with("${") && value.ends_with('}')
}

/// A persisted driver configuration record.
///
/// `attributes` holds only the overrides on top of the configuration
/// type's template; the full configuration is rebuilt at read time by
/// template + credential substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfigurationRow {
    pub id: u32,
    pub config_type_id: u32,
    pub attributes: BTreeMap<String, String>,
    pub working: bool,
    pub active: bool,
    pub priority_rank: u32,
    pub credential_ids: BTreeSet<CredentialId>,
}

/// Catalog entry classifying a discovered configuration into a known
/// protocol family.
///
/// Template values are either literals (must match exactly) or `${...}`
/// placeholders (any value satisfies the match; the placeholder is
/// resolved from the asset or its credentials at instantiation time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfigurationType {
    pub id: u32,
    pub pretty_name: String,
    pub template: BTreeMap<String, String>,
}

impl DeviceConfigurationType {
    /// How many template attributes `config` satisfies, or `None` if any
    /// template attribute is missing or differs.
    pub fn specificity_for(&self, config: &DeviceConfiguration) -> Option<usize> {
        let mut matched = 0;
        for (key, value) in &self.template {
            match config.get(key) {
                Some(actual) if is_placeholder(value) || actual == value => matched += 1,
                _ => return None,
            }
        }
        Some(matched)
    }
}

/// A known configuration paired with the id of the database row it was
/// instantiated from. Constructed once at query time so status updates
/// address rows directly instead of correlating parallel lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownConfiguration {
    pub row_id: u32,
    pub config: DeviceConfiguration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_ignores_insertion_order() {
        let a = DeviceConfiguration::from_pairs([("driver", "snmp-ups"), ("port", "10.0.0.5")]);
        let b = DeviceConfiguration::from_pairs([("port", "10.0.0.5"), ("driver", "snmp-ups")]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_subset_matching() {
        let known = DeviceConfiguration::from_pairs([
            ("driver", "snmp-ups"),
            ("port", "10.0.0.5"),
            ("desc", "rack A"),
            ("name", "ups-1"),
        ]);
        let detected = DeviceConfiguration::from_pairs([
            ("driver", "snmp-ups"),
            ("port", "10.0.0.5"),
            ("community", "public"),
        ]);
        // desc/name are non-identifying and must not block the match
        assert!(known.is_subset_of(&detected));
        // but a differing identifying attribute must
        let other = DeviceConfiguration::from_pairs([("driver", "snmp-ups"), ("port", "10.0.0.6")]);
        assert!(!known.is_subset_of(&other));
    }

    #[test]
    fn test_type_specificity() {
        let mut template = BTreeMap::new();
        template.insert("driver".to_string(), "snmp-ups".to_string());
        template.insert("port".to_string(), "${asset.ip}".to_string());
        let ctype = DeviceConfigurationType {
            id: 1,
            pretty_name: "SNMP v1".to_string(),
            template,
        };

        let matching =
            DeviceConfiguration::from_pairs([("driver", "snmp-ups"), ("port", "10.0.0.5")]);
        assert_eq!(ctype.specificity_for(&matching), Some(2));

        let wrong_driver =
            DeviceConfiguration::from_pairs([("driver", "usbhid-ups"), ("port", "auto")]);
        assert_eq!(ctype.specificity_for(&wrong_driver), None);

        let missing_port = DeviceConfiguration::from_pairs([("driver", "snmp-ups")]);
        assert_eq!(ctype.specificity_for(&missing_port), None);
    }
}
