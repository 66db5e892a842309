//! Device Registry
//!
//! Serializes allocation decisions and tracks which device ids are in use.

use std::collections::BTreeSet;
use std::future::Future;

use parking_lot::Mutex;
use tracing::debug;

/// Exclusive-execution allocation bookkeeping
///
/// [`DeviceRegistry::allocate_device`] runs one decision at a time. The set of
/// allocated ids sits behind its own lock so lookups made from inside a
/// decision (see [`DeviceRegistry::is_device_busy`]) never wait on the
/// decision lock.
#[derive(Default)]
pub struct DeviceRegistry {
    decision: tokio::sync::Mutex<()>,
    allocated: Mutex<BTreeSet<String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `decide` with mutual exclusion against every other allocation on
    /// this registry and record the returned id as allocated.
    ///
    /// Nothing is recorded when `decide` fails.
    pub async fn allocate_device<F, Fut, E>(&self, decide: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        self.allocate_with(decide, String::clone).await
    }

    /// Like [`DeviceRegistry::allocate_device`], for decisions that produce
    /// more than an id. `device_id` extracts the id to record.
    pub async fn allocate_with<T, F, Fut, E, K>(&self, decide: F, device_id: K) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        K: FnOnce(&T) -> String,
    {
        let _turn = self.decision.lock().await;
        let decision = decide().await?;

        let id = device_id(&decision);
        debug!("Registered {} as allocated", id);
        self.allocated.lock().insert(id);
        Ok(decision)
    }

    /// Release an allocated id. Unknown ids are ignored.
    pub fn dispose_device(&self, device_id: &str) -> bool {
        let removed = self.allocated.lock().remove(device_id);
        if removed {
            debug!("Released {}", device_id);
        }
        removed
    }

    pub fn is_device_busy(&self, device_id: &str) -> bool {
        self.allocated.lock().contains(device_id)
    }

    /// Currently allocated ids, sorted
    pub fn allocated_devices(&self) -> Vec<String> {
        self.allocated.lock().iter().cloned().collect()
    }
}
