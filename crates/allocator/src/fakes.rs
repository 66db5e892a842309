//! In-memory collaborators for allocator tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use droid_fleet_core::{
    DeviceEvent, DeviceEventSubscriber, Instance, InstanceHandle, InstanceState, Result, Sleeper,
};
use droid_fleet_registry::{CleanupRegistry, DeviceRegistry, InMemoryCleanupRegistry};

use crate::service::{InstanceLifecycleService, InstanceLookupService};

/// Ordered record of collaborator calls shared by all fakes
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

#[derive(Default)]
struct CloudState {
    instances: BTreeMap<String, Instance>,
    offline_polls: BTreeMap<String, u32>,
    created: u32,
    get_calls: u32,
    connect_calls: u32,
}

/// Lookup and lifecycle service backed by a map of instances
pub struct FakeCloud {
    registry: Arc<DeviceRegistry>,
    journal: Arc<Journal>,
    state: Mutex<CloudState>,
    /// Polls that report a created instance as still booting
    pub polls_until_online: Mutex<u32>,
    pub fail_create: Mutex<bool>,
    pub fail_get: Mutex<bool>,
    pub fail_delete: Mutex<BTreeSet<String>>,
}

impl FakeCloud {
    pub fn new(registry: Arc<DeviceRegistry>, journal: Arc<Journal>) -> Self {
        Self {
            registry,
            journal,
            state: Mutex::new(CloudState::default()),
            polls_until_online: Mutex::new(0),
            fail_create: Mutex::new(false),
            fail_get: Mutex::new(false),
            fail_delete: Mutex::new(BTreeSet::new()),
        }
    }

    /// Add an idle, online, connected instance
    pub fn add_free(&self, uuid: &str, adb_name: &str) -> Instance {
        self.add_idle(uuid, adb_name, InstanceState::Online, true, 0)
    }

    /// Add an idle instance that reports `state` for `offline_polls` more polls
    pub fn add_idle(
        &self,
        uuid: &str,
        adb_name: &str,
        state: InstanceState,
        adb_connected: bool,
        offline_polls: u32,
    ) -> Instance {
        let instance = Instance {
            uuid: uuid.to_string(),
            name: format!("free-{}", uuid),
            adb_name: adb_name.to_string(),
            state,
            adb_connected,
        };
        let mut cloud = self.state.lock();
        cloud.offline_polls.insert(uuid.to_string(), offline_polls);
        cloud.instances.insert(uuid.to_string(), instance.clone());
        instance
    }

    pub fn get_calls(&self) -> u32 {
        self.state.lock().get_calls
    }

    pub fn connect_calls(&self) -> u32 {
        self.state.lock().connect_calls
    }

    pub fn created(&self) -> u32 {
        self.state.lock().created
    }

    pub fn exists(&self, uuid: &str) -> bool {
        self.state.lock().instances.contains_key(uuid)
    }
}

#[async_trait]
impl InstanceLookupService for FakeCloud {
    async fn find_free_instance(&self) -> anyhow::Result<Option<Instance>> {
        // give a concurrent caller the chance to interleave
        tokio::task::yield_now().await;

        let state = self.state.lock();
        Ok(state
            .instances
            .values()
            .find(|i| !self.registry.is_device_busy(&i.uuid))
            .cloned())
    }

    async fn get_instance(&self, uuid: &str) -> anyhow::Result<Instance> {
        self.journal.push(format!("get {}", uuid));
        if *self.fail_get.lock() {
            return Err(anyhow!("HTTP 502 from instance API"));
        }

        let mut state = self.state.lock();
        state.get_calls += 1;

        let remaining = state.offline_polls.get(uuid).copied().unwrap_or(0);
        let next = if remaining > 0 {
            state.offline_polls.insert(uuid.to_string(), remaining - 1);
            InstanceState::Booting
        } else {
            InstanceState::Online
        };

        let instance = state
            .instances
            .get_mut(uuid)
            .ok_or_else(|| anyhow!("instance {} not found", uuid))?;
        instance.state = next;
        Ok(instance.clone())
    }
}

#[async_trait]
impl InstanceLifecycleService for FakeCloud {
    async fn create_instance(&self, recipe_uuid: &str) -> anyhow::Result<Instance> {
        if *self.fail_create.lock() {
            return Err(anyhow!("quota exceeded for recipe {}", recipe_uuid));
        }

        let polls = *self.polls_until_online.lock();
        let mut state = self.state.lock();
        state.created += 1;

        let n = state.created;
        let instance = Instance {
            uuid: format!("i{}", n),
            name: format!("{}-{}", recipe_uuid, n),
            adb_name: format!("localhost:{}", 5555 + 2 * (n - 1)),
            state: InstanceState::Creating,
            adb_connected: false,
        };
        state.offline_polls.insert(instance.uuid.clone(), polls);
        state.instances.insert(instance.uuid.clone(), instance.clone());

        self.journal.push(format!("create {}", instance.uuid));
        Ok(instance)
    }

    async fn delete_instance(&self, uuid: &str) -> anyhow::Result<()> {
        self.journal.push(format!("delete {}", uuid));
        if self.fail_delete.lock().contains(uuid) {
            return Err(anyhow!("instance {} is locked", uuid));
        }
        self.state.lock().instances.remove(uuid);
        Ok(())
    }

    async fn adb_connect_instance(&self, uuid: &str) -> anyhow::Result<Instance> {
        self.journal.push(format!("adb_connect {}", uuid));
        let mut state = self.state.lock();
        state.connect_calls += 1;

        let instance = state
            .instances
            .get_mut(uuid)
            .ok_or_else(|| anyhow!("instance {} not found", uuid))?;
        instance.adb_connected = true;
        Ok(instance.clone())
    }
}

/// In-memory cleanup registry that journals mutations
pub struct JournaledCleanup {
    pub inner: InMemoryCleanupRegistry,
    journal: Arc<Journal>,
}

impl JournaledCleanup {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            inner: InMemoryCleanupRegistry::new(),
            journal,
        }
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.inner.contains(&InstanceHandle::new(uuid))
    }
}

#[async_trait]
impl CleanupRegistry for JournaledCleanup {
    async fn allocate_device(&self, handle: InstanceHandle) -> Result<()> {
        self.journal.push(format!("cleanup+ {}", handle.uuid));
        self.inner.allocate_device(handle).await
    }

    async fn dispose_device(&self, handle: &InstanceHandle) -> Result<()> {
        self.journal.push(format!("cleanup- {}", handle.uuid));
        self.inner.dispose_device(handle).await
    }

    async fn handles(&self) -> Result<Vec<InstanceHandle>> {
        self.inner.handles().await
    }
}

/// Journals and keeps every event
pub struct RecordingSubscriber {
    journal: Arc<Journal>,
    pub events: Mutex<Vec<DeviceEvent>>,
}

impl RecordingSubscriber {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DeviceEventSubscriber for RecordingSubscriber {
    async fn on_event(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        self.journal.push(format!("event {}", event.name()));
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Rejects every event
pub struct FailingSubscriber;

#[async_trait]
impl DeviceEventSubscriber for FailingSubscriber {
    async fn on_event(&self, _event: &DeviceEvent) -> anyhow::Result<()> {
        Err(anyhow!("device log collector unavailable"))
    }
}

/// Records requested sleeps without waiting
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().push(duration);
    }
}
