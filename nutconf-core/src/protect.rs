//! Per-asset serialization locks
//!
//! Notifications for the same asset may be handled by different pool
//! workers; the registry hands out one mutex per asset name so the whole
//! apply/update/remove sequence runs exclusively for that asset while
//! unrelated assets proceed in parallel.
//!
//! Never acquire an asset lock while holding the manager's cache lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct AssetProtect {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AssetProtect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if needed) the lock for an asset.
    ///
    /// The caller binds the returned `Arc` and holds its guard for the
    /// duration of the whole per-asset operation.
    pub fn acquire(&self, asset_name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(
            locks
                .entry(asset_name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop the registry entry once an asset is deleted. Outstanding
    /// holders keep their own `Arc`; the entry is simply recreated if the
    /// asset name ever comes back.
    pub fn remove(&self, asset_name: &str) {
        self.locks.lock().remove(asset_name);
    }
}
