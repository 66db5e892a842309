//! Droid Fleet Allocator
//!
//! Hands out ready-to-use cloud emulator instances, reusing idle ones when
//! possible, and tears them down again.

pub mod allocator;
pub mod cloud;
pub mod recovery;
pub mod service;

#[cfg(test)]
mod fakes;

pub use allocator::{logged_allocation, DeviceAllocator, ALLOCATE_DEVICE_LOG_EVT};
pub use cloud::CloudInstanceAllocator;
pub use recovery::{recover_orphaned_instances, RecoveryReport};
pub use service::{InstanceLifecycleService, InstanceLookupService};
