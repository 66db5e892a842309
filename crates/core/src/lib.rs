//! Droid Fleet Core - shared types
//!
//! Data model, error type, device event bus, configuration and the bounded
//! retry helper shared by the registry and allocator crates.

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod retry;

pub use config::{BootWaitConfig, CleanupConfig, FleetConfig};
pub use device::{AllocationResult, Instance, InstanceHandle, InstanceState, Recipe};
pub use error::{BoxError, FleetError, Result};
pub use events::{DeviceEvent, DeviceEventSubscriber, EventBus, EventSubscription};
pub use retry::{retry_if, Backoff, RetryPolicy, Sleeper, TokioSleeper};

/// Droid Fleet version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
