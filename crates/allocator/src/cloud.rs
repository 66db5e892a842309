//! Cloud Instance Allocator
//!
//! Allocates cloud-hosted emulator instances:
//! - reuses a free instance or creates one, one decision at a time
//! - registers created instances for crash cleanup before waiting on them
//! - polls until the instance is online, then connects ADB if needed
//! - announces the device on the event bus

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use droid_fleet_core::{
    retry_if, AllocationResult, DeviceEvent, EventBus, FleetError, Instance, InstanceHandle,
    Recipe, Result, RetryPolicy, Sleeper, TokioSleeper,
};
use droid_fleet_registry::{CleanupRegistry, DeviceRegistry};

use crate::allocator::{logged_allocation, DeviceAllocator};
use crate::service::{InstanceLifecycleService, InstanceLookupService};

/// Outcome of one boot-wait poll
enum BootPoll {
    NotOnline,
    Failed(FleetError),
}

/// Allocator for cloud emulator instances
pub struct CloudInstanceAllocator {
    device_registry: Arc<DeviceRegistry>,
    cleanup_registry: Arc<dyn CleanupRegistry>,
    lookup: Arc<dyn InstanceLookupService>,
    lifecycle: Arc<dyn InstanceLifecycleService>,
    events: Arc<EventBus>,
    boot_wait: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl CloudInstanceAllocator {
    /// Create an allocator polling on the default boot-wait schedule
    pub fn new(
        device_registry: Arc<DeviceRegistry>,
        cleanup_registry: Arc<dyn CleanupRegistry>,
        lookup: Arc<dyn InstanceLookupService>,
        lifecycle: Arc<dyn InstanceLifecycleService>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            device_registry,
            cleanup_registry,
            lookup,
            lifecycle,
            events,
            boot_wait: RetryPolicy::boot_wait(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_boot_wait(mut self, policy: RetryPolicy) -> Self {
        self.boot_wait = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn boot_wait(&self) -> &RetryPolicy {
        &self.boot_wait
    }

    /// Tear an instance down and drop it from the registries.
    ///
    /// Steps run strictly in order: `beforeShutdownDevice`, cloud deletion,
    /// registry cleanup, `shutdownDevice`. The first failure stops the sequence.
    pub async fn deallocate_device(&self, instance: &Instance) -> Result<()> {
        let handle = InstanceHandle::from(instance);
        info!("Deallocating instance {}", instance);

        self.events
            .emit(DeviceEvent::BeforeShutdownDevice {
                device_id: instance.adb_name.clone(),
            })
            .await?;

        self.lifecycle
            .delete_instance(&instance.uuid)
            .await
            .map_err(|e| FleetError::upstream("delete_instance", &instance.uuid, e))?;

        self.cleanup_registry.dispose_device(&handle).await?;
        self.device_registry.dispose_device(&instance.uuid);

        self.events
            .emit(DeviceEvent::ShutdownDevice {
                device_id: instance.adb_name.clone(),
            })
            .await?;
        Ok(())
    }

    /// Reuse a free instance or create one, under the device registry's lock
    async fn synchronized_allocation(&self, recipe: &Recipe) -> Result<AllocationResult> {
        logged_allocation(recipe, move || async move {
            self.device_registry
                .allocate_with(
                    move || async move {
                        let found = self.lookup.find_free_instance().await.map_err(|e| {
                            FleetError::upstream("find_free_instance", &recipe.name, e)
                        })?;

                        match found {
                            Some(instance) => Ok::<_, FleetError>(AllocationResult {
                                instance,
                                is_new: false,
                            }),
                            None => {
                                let instance = self
                                    .lifecycle
                                    .create_instance(&recipe.uuid)
                                    .await
                                    .map_err(|e| {
                                        FleetError::upstream("create_instance", &recipe.uuid, e)
                                    })?;
                                Ok(AllocationResult {
                                    instance,
                                    is_new: true,
                                })
                            }
                        }
                    },
                    |decision: &AllocationResult| decision.instance.uuid.clone(),
                )
                .await
        })
        .await
    }

    /// Poll until the instance reports online
    async fn wait_for_instance_boot(&self, instance: Instance) -> Result<Instance> {
        if instance.is_online() {
            return Ok(instance);
        }

        let uuid = instance.uuid.as_str();
        debug!("Waiting for instance {} to come online", uuid);

        retry_if(
            &self.boot_wait,
            self.sleeper.as_ref(),
            |poll: &BootPoll| matches!(poll, BootPoll::NotOnline),
            move |attempt| async move {
                let snapshot = self
                    .lookup
                    .get_instance(uuid)
                    .await
                    .map_err(|e| BootPoll::Failed(FleetError::upstream("get_instance", uuid, e)))?;

                if snapshot.is_online() {
                    Ok(snapshot)
                } else {
                    debug!(
                        "Instance {} is {} (poll {})",
                        uuid,
                        snapshot.state.as_str(),
                        attempt
                    );
                    Err(BootPoll::NotOnline)
                }
            },
        )
        .await
        .map_err(|poll| match poll {
            BootPoll::NotOnline => FleetError::AllocationTimeout {
                uuid: uuid.to_string(),
                attempts: self.boot_wait.attempts.max(1),
            },
            BootPoll::Failed(err) => err,
        })
    }

    async fn adb_connect_if_needed(&self, instance: Instance) -> Result<Instance> {
        if instance.is_adb_connected() {
            return Ok(instance);
        }

        self.lifecycle
            .adb_connect_instance(&instance.uuid)
            .await
            .map_err(|e| FleetError::upstream("adb_connect_instance", &instance.uuid, e))
    }

    async fn notify_allocation(
        &self,
        instance: &Instance,
        recipe: &Recipe,
        is_new: bool,
    ) -> Result<()> {
        self.events
            .emit(DeviceEvent::BootDevice {
                cold_boot: is_new,
                device_id: instance.adb_name.clone(),
                device_type: recipe.name.clone(),
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceAllocator for CloudInstanceAllocator {
    type Query = Recipe;
    type Device = Instance;

    /// Allocate an online, ADB-connected instance for `recipe`.
    ///
    /// A failure after the instance was created leaves its handle in the
    /// cleanup registry; the instance itself is not deleted. A failure after
    /// the lookup-or-create step also leaves the instance id marked busy in
    /// the device registry for the life of the process, since the caller never
    /// receives an [`Instance`] to pass to [`Self::deallocate_device`].
    async fn allocate_device(&self, recipe: &Recipe) -> Result<Instance> {
        let AllocationResult { instance, is_new } = self.synchronized_allocation(recipe).await?;

        if is_new {
            info!("Created instance {} for {}", instance.uuid, recipe);
            self.cleanup_registry
                .allocate_device(InstanceHandle::from(&instance))
                .await?;
        }

        let instance = self.wait_for_instance_boot(instance).await?;
        let instance = self.adb_connect_if_needed(instance).await?;

        self.notify_allocation(&instance, recipe, is_new).await?;
        Ok(instance)
    }
}
