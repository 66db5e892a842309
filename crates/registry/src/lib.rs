//! Droid Fleet Registries
//!
//! The device registry serializes allocation decisions; the cleanup registry
//! keeps a recoverable record of instances created by this process.

pub mod cleanup;
pub mod device;

pub use cleanup::{CleanupEntry, CleanupRegistry, FileCleanupRegistry, InMemoryCleanupRegistry};
pub use device::DeviceRegistry;
