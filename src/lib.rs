//! Droid Fleet - cloud Android emulator allocation
//!
//! Hands out network-reachable emulator instances to test runs, reusing idle
//! instances when one is free and provisioning new ones otherwise.
//!
//! ## Architecture
//!
//! - `droid-fleet-core`: data model, errors, device events, configuration, retry
//! - `droid-fleet-registry`: device registry and crash-cleanup registry
//! - `droid-fleet-allocator`: the allocators and orphan recovery

#![warn(clippy::all)]

pub mod logging;

pub use droid_fleet_allocator as allocator;
pub use droid_fleet_core as core;
pub use droid_fleet_registry as registry;

/// Prelude module for convenient imports
pub mod prelude {
    pub use droid_fleet_allocator::{
        recover_orphaned_instances, CloudInstanceAllocator, DeviceAllocator,
        InstanceLifecycleService, InstanceLookupService,
    };
    pub use droid_fleet_core::{
        DeviceEvent, DeviceEventSubscriber, EventBus, FleetConfig, FleetError, Instance, Recipe,
        RetryPolicy,
    };
    pub use droid_fleet_registry::{
        CleanupRegistry, DeviceRegistry, FileCleanupRegistry, InMemoryCleanupRegistry,
    };
}
