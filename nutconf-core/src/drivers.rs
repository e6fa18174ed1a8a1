//! Driver lifecycle batching
//!
//! Configuration changes arrive in bursts (bulk discovery, credential
//! rotation); restarting a polling driver per individual change would
//! thrash the service manager. Producers enqueue unit names into two
//! pending sets and a background loop applies them in batches on a fixed
//! cadence, stops before starts.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use nutconf_error::{NutConfError, Result};

use crate::constants::drivers::UNIT_PREFIX;

/// Shutdown poll granularity of the background loop
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Name of the polling-driver service unit for an asset
pub fn driver_unit(asset_name: &str) -> String {
    format!("{UNIT_PREFIX}{asset_name}")
}

/// Seam to the init system
#[cfg_attr(test, mockall::automock)]
pub trait ServiceController: Send + Sync {
    fn start_units(&self, units: &[String]) -> Result<()>;
    fn stop_units(&self, units: &[String]) -> Result<()>;
}

/// systemd-backed controller shelling out to systemctl
pub struct SystemdController;

impl SystemdController {
    fn systemctl(operation: &str, units: &[String]) -> Result<()> {
        let output = Command::new("systemctl")
            .arg(operation)
            .args(units)
            .output()
            .map_err(|e| NutConfError::service(format!("failed to run systemctl: {e}")))?;
        if !output.status.success() {
            return Err(NutConfError::service(format!(
                "systemctl {operation} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl ServiceController for SystemdController {
    fn start_units(&self, units: &[String]) -> Result<()> {
        Self::systemctl("start", units)
    }

    fn stop_units(&self, units: &[String]) -> Result<()> {
        Self::systemctl("stop", units)
    }
}

struct LifecycleInner {
    controller: Arc<dyn ServiceController>,
    pending_start: Mutex<BTreeSet<String>>,
    pending_stop: Mutex<BTreeSet<String>>,
    shutdown: AtomicBool,
}

impl LifecycleInner {
    /// Apply and clear both pending sets, stops first.
    ///
    /// Controller failures are logged, not propagated: the requests are
    /// consumed either way and the next configuration change re-enqueues
    /// whatever still matters.
    fn drain(&self) {
        let stops: Vec<String> = {
            let mut pending = self.pending_stop.lock();
            std::mem::take(&mut *pending).into_iter().collect()
        };
        let starts: Vec<String> = {
            let mut pending = self.pending_start.lock();
            std::mem::take(&mut *pending).into_iter().collect()
        };

        if !stops.is_empty() {
            info!(count = stops.len(), "stopping driver units");
            if let Err(e) = self.controller.stop_units(&stops) {
                error!(error = %e, "failed to stop driver units");
            }
        }
        if !starts.is_empty() {
            info!(count = starts.len(), "starting driver units");
            if let Err(e) = self.controller.start_units(&starts) {
                error!(error = %e, "failed to start driver units");
            }
        }
    }
}

/// Batches driver start/stop requests from concurrent producers
pub struct DriverLifecycle {
    inner: Arc<LifecycleInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DriverLifecycle {
    /// Start the coordinator with its background drain loop
    pub fn new(controller: Arc<dyn ServiceController>, drain_interval: Duration) -> Self {
        let inner = Arc::new(LifecycleInner {
            controller,
            pending_start: Mutex::new(BTreeSet::new()),
            pending_stop: Mutex::new(BTreeSet::new()),
            shutdown: AtomicBool::new(false),
        });

        let loop_inner = Arc::clone(&inner);
        let handle = thread::spawn(move || loop {
            let mut waited = Duration::ZERO;
            while waited < drain_interval {
                if loop_inner.shutdown.load(Ordering::Relaxed) {
                    // flush whatever is still queued before exiting
                    loop_inner.drain();
                    return;
                }
                let step = SHUTDOWN_POLL.min(drain_interval - waited);
                thread::sleep(step);
                waited += step;
            }
            loop_inner.drain();
        });

        Self {
            inner,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Queue a unit start; cancels any pending stop for the same unit
    pub fn request_start(&self, unit: &str) {
        self.inner.pending_stop.lock().remove(unit);
        self.inner.pending_start.lock().insert(unit.to_string());
        debug!(unit, "driver start queued");
    }

    /// Queue a unit stop; cancels any pending start for the same unit
    pub fn request_stop(&self, unit: &str) {
        self.inner.pending_start.lock().remove(unit);
        self.inner.pending_stop.lock().insert(unit.to_string());
        debug!(unit, "driver stop queued");
    }

    /// Apply all pending actions immediately
    pub fn flush(&self) {
        self.inner.drain();
    }

    /// Pending (start, stop) unit counts
    pub fn pending_counts(&self) -> (usize, usize) {
        (
            self.inner.pending_start.lock().len(),
            self.inner.pending_stop.lock().len(),
        )
    }

    /// Stop the background loop, flushing pending actions
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DriverLifecycle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
