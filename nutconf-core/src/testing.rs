//! Test doubles shared by unit and integration tests
//!
//! In-memory stand-ins for the external collaborators (store, credential
//! store, scanners, bus, init system). They record every interaction so
//! tests can assert on ordering and fan-out, not just end state.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use nutconf_error::Result;
use nutconf_protocol::Reply;

use crate::connector::NotificationBus;
use crate::credentials::{CredentialId, CredentialProvider, CredentialV1, CredentialV3};
use crate::device::{DeviceConfiguration, DeviceConfigurationRow, DeviceConfigurationType};
use crate::drivers::ServiceController;
use crate::scan::{ProbeFn, ProtocolScanner};
use crate::store::ConfigStore;

/// In-memory [`ConfigStore`] with recorded candidate queries
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, Vec<DeviceConfigurationRow>>>,
    types: Mutex<Vec<DeviceConfigurationType>>,
    next_id: Mutex<u32>,
    candidate_queries: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn with_types(types: Vec<DeviceConfigurationType>) -> Self {
        Self {
            types: Mutex::new(types),
            next_id: Mutex::new(1),
            ..Self::default()
        }
    }

    /// Seed a full row for an asset, returning its id
    pub fn seed_row(
        &self,
        asset_name: &str,
        config_type_id: u32,
        working: bool,
        active: bool,
        credential_ids: BTreeSet<CredentialId>,
        attributes: BTreeMap<String, String>,
    ) -> u32 {
        let id = self.take_id();
        let mut rows = self.rows.lock();
        let asset_rows = rows.entry(asset_name.to_string()).or_default();
        let priority_rank = asset_rows.len() as u32;
        asset_rows.push(DeviceConfigurationRow {
            id,
            config_type_id,
            attributes,
            working,
            active,
            priority_rank,
            credential_ids,
        });
        id
    }

    /// Snapshot of one asset's rows, in priority order
    pub fn rows_for(&self, asset_name: &str) -> Vec<DeviceConfigurationRow> {
        let mut rows = self
            .rows
            .lock()
            .get(asset_name)
            .cloned()
            .unwrap_or_default();
        rows.sort_by_key(|row| row.priority_rank);
        rows
    }

    /// Asset names passed to `list_candidate_configurations`, in call order
    pub fn candidate_queries(&self) -> Vec<String> {
        self.candidate_queries.lock().clone()
    }

    fn take_id(&self) -> u32 {
        let mut next = self.next_id.lock();
        if *next == 0 {
            *next = 1;
        }
        let id = *next;
        *next += 1;
        id
    }
}

impl ConfigStore for MemoryStore {
    fn list_configurations(&self, asset_name: &str) -> Result<Vec<DeviceConfigurationRow>> {
        Ok(self.rows_for(asset_name))
    }

    fn list_candidate_configurations(
        &self,
        asset_name: &str,
    ) -> Result<Vec<DeviceConfigurationRow>> {
        self.candidate_queries.lock().push(asset_name.to_string());
        Ok(self
            .rows_for(asset_name)
            .into_iter()
            .filter(|row| row.working && row.active)
            .collect())
    }

    fn list_configuration_types(&self) -> Result<Vec<DeviceConfigurationType>> {
        Ok(self.types.lock().clone())
    }

    fn insert_configuration(
        &self,
        asset_name: &str,
        config_type_id: u32,
        working: bool,
        active: bool,
        credential_ids: &BTreeSet<CredentialId>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<u32> {
        Ok(self.seed_row(
            asset_name,
            config_type_id,
            working,
            active,
            credential_ids.clone(),
            attributes.clone(),
        ))
    }

    fn set_configuration_working(&self, id: u32, working: bool) -> Result<()> {
        let mut rows = self.rows.lock();
        for asset_rows in rows.values_mut() {
            for row in asset_rows.iter_mut() {
                if row.id == id {
                    row.working = working;
                    return Ok(());
                }
            }
        }
        Err(nutconf_error::NutConfError::RowNotFound(id))
    }

    fn set_configuration_priorities(&self, asset_name: &str, ordered_ids: &[u32]) -> Result<()> {
        let mut rows = self.rows.lock();
        let Some(asset_rows) = rows.get_mut(asset_name) else {
            return Ok(());
        };
        for row in asset_rows.iter_mut() {
            if let Some(rank) = ordered_ids.iter().position(|id| *id == row.id) {
                row.priority_rank = rank as u32;
            }
        }
        Ok(())
    }
}

/// Fixed credential sets
#[derive(Default)]
pub struct StaticCredentials {
    pub v1: Vec<CredentialV1>,
    pub v3: Vec<CredentialV3>,
}

impl CredentialProvider for StaticCredentials {
    fn credentials_snmpv1(&self) -> Result<Vec<CredentialV1>> {
        Ok(self.v1.clone())
    }

    fn credentials_snmpv3(&self) -> Result<Vec<CredentialV3>> {
        Ok(self.v3.clone())
    }
}

/// Scanner returning scripted candidates per asset and recording every
/// asset it was asked to probe
#[derive(Default)]
pub struct ScriptedScanner {
    script: Mutex<HashMap<String, Vec<DeviceConfiguration>>>,
    scanned: Mutex<Vec<String>>,
}

impl ScriptedScanner {
    pub fn set_candidates(&self, asset_name: &str, candidates: Vec<DeviceConfiguration>) {
        self.script
            .lock()
            .insert(asset_name.to_string(), candidates);
    }

    /// Asset names probed so far, in dispatch order
    pub fn scanned(&self) -> Vec<String> {
        self.scanned.lock().clone()
    }
}

impl ProtocolScanner for ScriptedScanner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn probes(
        &self,
        asset_name: &str,
        _v1: &[CredentialV1],
        _v3: &[CredentialV3],
        _probe_timeout: Duration,
    ) -> Vec<ProbeFn> {
        self.scanned.lock().push(asset_name.to_string());
        let candidates = self
            .script
            .lock()
            .get(asset_name)
            .cloned()
            .unwrap_or_default();
        vec![Box::new(move || Ok(candidates))]
    }
}

/// Bus capturing publications and replies
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, String)>>,
    replies: Mutex<Vec<Reply>>,
}

impl RecordingBus {
    /// (subject, asset) pairs in publication order
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().clone()
    }

    pub fn replies(&self) -> Vec<Reply> {
        self.replies.lock().clone()
    }
}

impl NotificationBus for RecordingBus {
    fn publish(&self, subject: &str, asset_name: &str) -> Result<()> {
        self.published
            .lock()
            .push((subject.to_string(), asset_name.to_string()));
        Ok(())
    }

    fn send_reply(&self, reply: &Reply) -> Result<()> {
        self.replies.lock().push(reply.clone());
        Ok(())
    }
}

/// Controller accepting every start/stop without side effects
pub struct NullServiceController;

impl ServiceController for NullServiceController {
    fn start_units(&self, _units: &[String]) -> Result<()> {
        Ok(())
    }

    fn stop_units(&self, _units: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Controller recording the unit batches it was asked to apply
#[derive(Default)]
pub struct RecordingController {
    started: Mutex<Vec<Vec<String>>>,
    stopped: Mutex<Vec<Vec<String>>>,
}

impl RecordingController {
    pub fn started(&self) -> Vec<Vec<String>> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<Vec<String>> {
        self.stopped.lock().clone()
    }
}

impl ServiceController for RecordingController {
    fn start_units(&self, units: &[String]) -> Result<()> {
        self.started.lock().push(units.to_vec());
        Ok(())
    }

    fn stop_units(&self, units: &[String]) -> Result<()> {
        self.stopped.lock().push(units.to_vec());
        Ok(())
    }
}
