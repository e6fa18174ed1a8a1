//! Scan orchestration
//!
//! Runs every applicable protocol/credential probe for an asset on the
//! shared scanner pool and aggregates the raw candidate configurations.
//! Probes that fail or miss the deadline contribute nothing and are not
//! retried within the same scan; the next reconciliation cycle is the
//! retry. Downstream code must treat the result as a set.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use nutconf_error::Result;

use crate::credentials::{CredentialV1, CredentialV3};
use crate::device::DeviceConfiguration;
use crate::settings::EngineSettings;

use super::pool::WorkerPool;

/// One probe attempt: blocks on network I/O, returns raw candidates.
///
/// Implementations must bound themselves by the `probe_timeout` handed
/// to [`ProtocolScanner::probes`]; the orchestrator additionally
/// enforces a per-asset deadline over the whole batch.
pub type ProbeFn = Box<dyn FnOnce() -> Result<Vec<DeviceConfiguration>> + Send>;

/// A pluggable per-protocol scanner (SNMPv1/v3, XML, USB, serial).
///
/// Produces one probe per applicable protocol/credential combination for
/// the asset; an empty list means the protocol does not apply.
pub trait ProtocolScanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn probes(
        &self,
        asset_name: &str,
        v1: &[CredentialV1],
        v3: &[CredentialV3],
        probe_timeout: Duration,
    ) -> Vec<ProbeFn>;
}

pub struct ScanOrchestrator {
    pool: Arc<WorkerPool>,
    scanners: Vec<Arc<dyn ProtocolScanner>>,
    probe_timeout: Duration,
    scan_timeout: Duration,
}

impl ScanOrchestrator {
    pub fn new(
        pool: Arc<WorkerPool>,
        scanners: Vec<Arc<dyn ProtocolScanner>>,
        probe_timeout: Duration,
        scan_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            scanners,
            probe_timeout,
            scan_timeout,
        }
    }

    /// Build an orchestrator with the configured timeouts
    pub fn from_settings(
        pool: Arc<WorkerPool>,
        scanners: Vec<Arc<dyn ProtocolScanner>>,
        settings: &EngineSettings,
    ) -> Self {
        Self::new(
            pool,
            scanners,
            settings.probe_timeout(),
            settings.scan_timeout(),
        )
    }

    /// Scan one asset across all protocols and credential combinations.
    ///
    /// Purely a producer: no side effects beyond the probes' own network
    /// calls. Duplicate candidates are collapsed.
    pub fn scan(
        &self,
        asset_name: &str,
        v1: &[CredentialV1],
        v3: &[CredentialV3],
    ) -> Vec<DeviceConfiguration> {
        let (tx, rx) = mpsc::channel();
        let mut dispatched = 0usize;

        for scanner in &self.scanners {
            for probe in scanner.probes(asset_name, v1, v3, self.probe_timeout) {
                let tx = tx.clone();
                let protocol = scanner.name();
                self.pool.execute(move || {
                    // The aggregator may have given up already; a failed
                    // send just discards a late result.
                    let _ = tx.send((protocol, probe()));
                });
                dispatched += 1;
            }
        }
        drop(tx);
        debug!(asset = asset_name, probes = dispatched, "scan dispatched");

        let deadline = Instant::now() + self.scan_timeout;
        let mut detected: Vec<DeviceConfiguration> = Vec::new();
        let mut received = 0usize;
        while received < dispatched {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(
                    asset = asset_name,
                    pending = dispatched - received,
                    "scan deadline reached, discarding pending probes"
                );
                break;
            }
            match rx.recv_timeout(remaining) {
                Ok((protocol, Ok(candidates))) => {
                    received += 1;
                    for candidate in candidates {
                        if !detected.contains(&candidate) {
                            detected.push(candidate);
                        }
                    }
                    debug!(asset = asset_name, protocol, "probe finished");
                }
                Ok((protocol, Err(e))) => {
                    received += 1;
                    debug!(asset = asset_name, protocol, error = %e, "probe failed");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    warn!(
                        asset = asset_name,
                        pending = dispatched - received,
                        "scan deadline reached, discarding pending probes"
                    );
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!(
            asset = asset_name,
            candidates = detected.len(),
            "scan finished"
        );
        detected
    }
}
