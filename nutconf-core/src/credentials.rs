//! Credential references and the external credential-store seam
//!
//! Credentials themselves live in an external secure store; the engine
//! only handles opaque ids plus the few attributes needed to instantiate
//! and match SNMP configurations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use nutconf_error::Result;

use crate::device::DeviceConfiguration;

/// Opaque reference into the external credential store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// SNMPv1 credential (community string)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialV1 {
    pub id: CredentialId,
    pub community: String,
}

/// SNMPv3 credential (user plus optional auth/privacy passphrases)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialV3 {
    pub id: CredentialId,
    pub user: String,
    pub auth_password: Option<String>,
    pub priv_password: Option<String>,
}

/// Provider of the credential sets used for scanning and instantiation
pub trait CredentialProvider: Send + Sync {
    fn credentials_snmpv1(&self) -> Result<Vec<CredentialV1>>;
    fn credentials_snmpv3(&self) -> Result<Vec<CredentialV3>>;
}

/// Resolve which credentials a detected configuration was produced with,
/// by matching its attributes against the provided credential sets.
pub fn match_credential_ids(
    config: &DeviceConfiguration,
    v1: &[CredentialV1],
    v3: &[CredentialV3],
) -> BTreeSet<CredentialId> {
    let mut ids = BTreeSet::new();
    if let Some(community) = config.get("community") {
        for credential in v1 {
            if credential.community == community {
                ids.insert(credential.id.clone());
            }
        }
    }
    if let Some(user) = config.get("secName") {
        for credential in v3 {
            if credential.user == user {
                ids.insert(credential.id.clone());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1(id: &str, community: &str) -> CredentialV1 {
        CredentialV1 {
            id: CredentialId::new(id),
            community: community.to_string(),
        }
    }

    fn v3(id: &str, user: &str) -> CredentialV3 {
        CredentialV3 {
            id: CredentialId::new(id),
            user: user.to_string(),
            auth_password: None,
            priv_password: None,
        }
    }

    #[test]
    fn test_match_by_community() {
        let config = DeviceConfiguration::from_pairs([
            ("driver", "snmp-ups"),
            ("community", "public"),
        ]);
        let ids = match_credential_ids(
            &config,
            &[v1("c1", "public"), v1("c2", "private")],
            &[],
        );
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&CredentialId::new("c1")));
    }

    #[test]
    fn test_match_by_sec_name() {
        let config =
            DeviceConfiguration::from_pairs([("driver", "snmp-ups"), ("secName", "admin")]);
        let ids = match_credential_ids(&config, &[], &[v3("c3", "admin"), v3("c4", "ops")]);
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(&CredentialId::new("c3")));
    }

    #[test]
    fn test_no_credential_attributes() {
        let config = DeviceConfiguration::from_pairs([("driver", "usbhid-ups"), ("port", "auto")]);
        assert!(match_credential_ids(&config, &[v1("c1", "public")], &[v3("c3", "admin")]).is_empty());
    }
}
