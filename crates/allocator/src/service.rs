//! Cloud instance services
//!
//! Implemented by the provider integration. Failures are opaque to the
//! allocator and surface as [`FleetError::Upstream`](droid_fleet_core::FleetError::Upstream).

use async_trait::async_trait;

use droid_fleet_core::Instance;

/// Finds instances
#[async_trait]
pub trait InstanceLookupService: Send + Sync {
    /// An idle instance not held by any allocation, if one exists
    async fn find_free_instance(&self) -> anyhow::Result<Option<Instance>>;

    /// Fresh snapshot of an instance
    async fn get_instance(&self, uuid: &str) -> anyhow::Result<Instance>;
}

/// Creates, connects and deletes instances
#[async_trait]
pub trait InstanceLifecycleService: Send + Sync {
    /// Start a new instance from a recipe
    async fn create_instance(&self, recipe_uuid: &str) -> anyhow::Result<Instance>;

    async fn delete_instance(&self, uuid: &str) -> anyhow::Result<()>;

    /// Connect the local ADB server to the instance and return the updated snapshot
    async fn adb_connect_instance(&self, uuid: &str) -> anyhow::Result<Instance>;
}
