//! Bus-facing connector
//!
//! Receives already-decoded asset/credential notifications and requests,
//! offloads each one to the notification worker pool, and publishes the
//! resulting configuration events. Handlers never block the caller: the
//! bus reader thread stays free while pool workers run the pipelines,
//! serialized per asset through the shared lock registry.

use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use anyhow::Context;
use nutconf_error::Result;
use nutconf_protocol::{
    AssetEvent, AssetOperation, AssetStatus, CredentialEvent, Reply, ReplyStatus,
    RequestEnvelope, SUBJECT_ADD_CONFIG, SUBJECT_REMOVE_CONFIG, SUBJECT_RESCAN_ASSET,
};

use crate::credentials::CredentialId;
use crate::manager::ConfigurationManager;
use crate::protect::AssetProtect;
use crate::scan::WorkerPool;
use crate::settings::EngineSettings;

/// Outbound seam to the message bus
pub trait NotificationBus: Send + Sync {
    /// Publish a configuration event for an asset
    fn publish(&self, subject: &str, asset_name: &str) -> Result<()>;

    /// Route a reply back to a requester
    fn send_reply(&self, reply: &Reply) -> Result<()>;
}

pub struct ConfigurationConnector {
    manager: Arc<ConfigurationManager>,
    bus: Arc<dyn NotificationBus>,
    protect: Arc<AssetProtect>,
    workers: WorkerPool,
}

impl ConfigurationConnector {
    pub fn new(
        manager: Arc<ConfigurationManager>,
        bus: Arc<dyn NotificationBus>,
        settings: &EngineSettings,
    ) -> Self {
        let protect = manager.protect();
        Self {
            manager,
            bus,
            protect,
            workers: WorkerPool::new("notification", settings.worker_pool_size),
        }
    }

    /// Handle an asset lifecycle notification.
    ///
    /// Non-power-device events are dropped here; everything else is
    /// offloaded to the worker pool and processed under the asset's lock.
    pub fn handle_asset_notification(&self, event: AssetEvent) {
        if !event.is_power_device() {
            trace!(
                asset = event.name.as_str(),
                kind = event.kind.as_str(),
                subtype = event.subtype.as_str(),
                "ignoring non power-device event"
            );
            return;
        }

        let manager = Arc::clone(&self.manager);
        let bus = Arc::clone(&self.bus);
        let protect = Arc::clone(&self.protect);
        self.workers.execute(move || {
            if let Err(e) = process_asset_event(&manager, &*bus, &protect, &event) {
                warn!(
                    asset = event.name.as_str(),
                    error = %e,
                    "asset notification processing failed"
                );
            }
        });
    }

    /// Handle a credential-store change notification.
    ///
    /// Re-validates every cached asset referencing the credential and
    /// publishes `addConfig` for each one whose configuration changed.
    pub fn handle_credential_notification(&self, event: CredentialEvent) {
        let manager = Arc::clone(&self.manager);
        let bus = Arc::clone(&self.bus);
        self.workers.execute(move || {
            let credential_id = CredentialId::new(event.credential_id.clone());
            info!(credential = %credential_id, "credential changed, re-validating assets");
            match manager.manage_credentials_configuration(&credential_id) {
                Ok(changed) => {
                    for asset_name in changed {
                        if let Err(e) = bus.publish(SUBJECT_ADD_CONFIG, &asset_name) {
                            warn!(
                                asset = asset_name.as_str(),
                                error = %e,
                                "failed to publish configuration event"
                            );
                        }
                    }
                }
                Err(e) => warn!(
                    credential = %credential_id,
                    error = %e,
                    "credential re-validation failed"
                ),
            }
        });
    }

    /// Handle a synchronous request.
    ///
    /// Requests with unusable metadata are answered `ko` when they can be
    /// answered at all; valid ones are dispatched on the worker pool and
    /// answered when the pipeline finishes.
    pub fn handle_request(&self, request: RequestEnvelope) {
        if let Err(field) = request.validate() {
            warn!(
                subject = request.subject.as_str(),
                missing = field,
                "malformed request"
            );
            if !request.reply_to.is_empty() && !request.correlation_id.is_empty() {
                let reply = Reply::to_request(
                    &request,
                    ReplyStatus::Ko,
                    vec![format!("missing {field}")],
                );
                if let Err(e) = self.bus.send_reply(&reply) {
                    warn!(error = %e, "failed to send reply");
                }
            }
            return;
        }

        let manager = Arc::clone(&self.manager);
        let bus = Arc::clone(&self.bus);
        let protect = Arc::clone(&self.protect);
        self.workers.execute(move || {
            let (status, payload) =
                match dispatch_request(&manager, &protect, &request) {
                    Ok(payload) => (ReplyStatus::Ok, payload),
                    Err(e) => {
                        warn!(
                            subject = request.subject.as_str(),
                            error = %e,
                            "request failed"
                        );
                        (ReplyStatus::Ko, vec![e.to_string()])
                    }
                };
            let reply = Reply::to_request(&request, status, payload);
            if let Err(e) = bus.send_reply(&reply) {
                warn!(error = %e, "failed to send reply");
            }
        });
    }
}

/// Run the pipeline an asset event calls for and publish the outcome.
fn process_asset_event(
    manager: &ConfigurationManager,
    bus: &dyn NotificationBus,
    protect: &AssetProtect,
    event: &AssetEvent,
) -> Result<()> {
    let lock = protect.acquire(&event.name);
    let guard = lock.lock();

    match event.operation {
        AssetOperation::Create => {
            if event.status != AssetStatus::Active {
                debug!(asset = event.name.as_str(), "created nonactive, nothing to do");
                return Ok(());
            }
            info!(asset = event.name.as_str(), "asset created, configuring");
            manager.scan_asset_configurations(&event.name)?;
            manager.sort_asset_priorities(&event.name)?;
            if manager.apply_asset_configuration(&event.name)? {
                bus.publish(SUBJECT_ADD_CONFIG, &event.name)?;
            }
        }
        AssetOperation::Update => {
            if manager.update_asset_configuration(&event.name, event.status)? {
                let subject = match event.status {
                    AssetStatus::Active => SUBJECT_ADD_CONFIG,
                    AssetStatus::Nonactive => SUBJECT_REMOVE_CONFIG,
                };
                bus.publish(subject, &event.name)?;
            }
        }
        AssetOperation::Delete => {
            manager.remove_asset_configuration(&event.name)?;
            bus.publish(SUBJECT_REMOVE_CONFIG, &event.name)?;
            drop(guard);
            protect.remove(&event.name);
        }
    }
    Ok(())
}

/// Dispatch a validated request to its pipeline; the returned payload
/// goes into the `ok` reply.
fn dispatch_request(
    manager: &ConfigurationManager,
    protect: &AssetProtect,
    request: &RequestEnvelope,
) -> anyhow::Result<Vec<String>> {
    match request.subject.as_str() {
        SUBJECT_RESCAN_ASSET => {
            let asset_name = request
                .payload
                .first()
                .context("rescan request carries no asset name")?;
            info!(asset = asset_name.as_str(), "rescan requested");

            let lock = protect.acquire(asset_name);
            let _guard = lock.lock();
            manager.scan_asset_configurations(asset_name)?;
            manager.sort_asset_priorities(asset_name)?;
            manager.apply_asset_configuration(asset_name)?;
            Ok(vec![asset_name.clone()])
        }
        other => anyhow::bail!("unsupported request subject: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::DriverLifecycle;
    use crate::scan::ScanOrchestrator;
    use crate::testing::{
        MemoryStore, NullServiceController, RecordingBus, ScriptedScanner, StaticCredentials,
    };
    use std::time::Duration;

    fn settings(dir: &std::path::Path) -> EngineSettings {
        EngineSettings {
            device_dir: dir.to_path_buf(),
            scanner_pool_size: 4,
            worker_pool_size: 2,
            ..EngineSettings::default()
        }
    }

    fn connector(
        dir: &std::path::Path,
        store: Arc<MemoryStore>,
        scanner: Arc<ScriptedScanner>,
    ) -> (ConfigurationConnector, Arc<RecordingBus>) {
        let settings = settings(dir);
        let pool = Arc::new(WorkerPool::new("scan", settings.scanner_pool_size));
        let orchestrator = ScanOrchestrator::from_settings(pool, vec![scanner], &settings);
        let drivers = Arc::new(DriverLifecycle::new(
            Arc::new(NullServiceController),
            Duration::from_secs(3600),
        ));
        let manager = Arc::new(ConfigurationManager::new(
            store,
            Arc::new(StaticCredentials::default()),
            orchestrator,
            drivers,
            &settings,
        ));
        let bus = Arc::new(RecordingBus::default());
        let connector = ConfigurationConnector::new(manager, bus.clone(), &settings);
        (connector, bus)
    }

    fn power_event(operation: AssetOperation, status: AssetStatus) -> AssetEvent {
        AssetEvent {
            name: "ups-1".to_string(),
            kind: "device".to_string(),
            subtype: "ups".to_string(),
            operation,
            status,
        }
    }

    #[test]
    fn test_non_power_devices_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, bus) = connector(
            dir.path(),
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedScanner::default()),
        );

        let mut event = power_event(AssetOperation::Delete, AssetStatus::Active);
        event.subtype = "server".to_string();
        connector.handle_asset_notification(event);
        drop(connector);
        assert!(bus.published().is_empty());
    }

    #[test]
    fn test_delete_publishes_remove_config() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, bus) = connector(
            dir.path(),
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedScanner::default()),
        );

        connector.handle_asset_notification(power_event(
            AssetOperation::Delete,
            AssetStatus::Nonactive,
        ));
        drop(connector);
        assert_eq!(
            bus.published(),
            vec![(SUBJECT_REMOVE_CONFIG.to_string(), "ups-1".to_string())]
        );
    }

    #[test]
    fn test_malformed_request_gets_ko_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, bus) = connector(
            dir.path(),
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedScanner::default()),
        );

        connector.handle_request(RequestEnvelope {
            subject: SUBJECT_RESCAN_ASSET.to_string(),
            correlation_id: "9".to_string(),
            reply_to: "client-1".to_string(),
            payload: vec![],
        });
        drop(connector);

        let replies = bus.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Ko);
        assert_eq!(replies[0].to, "client-1");
    }

    #[test]
    fn test_unknown_subject_gets_ko_reply() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, bus) = connector(
            dir.path(),
            Arc::new(MemoryStore::default()),
            Arc::new(ScriptedScanner::default()),
        );

        connector.handle_request(RequestEnvelope {
            subject: "wipeEverything".to_string(),
            correlation_id: "10".to_string(),
            reply_to: "client-2".to_string(),
            payload: vec!["ups-1".to_string()],
        });
        drop(connector);

        let replies = bus.replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Ko);
    }
}
