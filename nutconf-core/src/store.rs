//! Configuration store gateway
//!
//! Narrow data-access seam over the relational store holding persisted
//! driver configurations and the configuration-type catalog. Schema and
//! query execution live behind this trait; every operation returns an
//! explicit `Result` and a failure aborts only the asset being processed.

use std::collections::{BTreeMap, BTreeSet};

use nutconf_error::Result;

use crate::credentials::CredentialId;
use crate::device::{DeviceConfigurationRow, DeviceConfigurationType};

pub trait ConfigStore: Send + Sync {
    /// All persisted configuration rows for an asset, in stable query order
    fn list_configurations(&self, asset_name: &str) -> Result<Vec<DeviceConfigurationRow>>;

    /// Working, active rows for an asset, ordered by priority rank
    fn list_candidate_configurations(
        &self,
        asset_name: &str,
    ) -> Result<Vec<DeviceConfigurationRow>>;

    /// The configuration-type catalog, in declaration order
    fn list_configuration_types(&self) -> Result<Vec<DeviceConfigurationType>>;

    /// Persist a newly discovered configuration; returns the new row id
    fn insert_configuration(
        &self,
        asset_name: &str,
        config_type_id: u32,
        working: bool,
        active: bool,
        credential_ids: &BTreeSet<CredentialId>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<u32>;

    /// Flip the working flag of one configuration row
    fn set_configuration_working(&self, id: u32, working: bool) -> Result<()>;

    /// Rewrite the priority ranks of an asset's rows to the given order
    fn set_configuration_priorities(&self, asset_name: &str, ordered_ids: &[u32]) -> Result<()>;
}
