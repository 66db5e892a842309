//! Device Types and State
//!
//! Recipes, cloud emulator instances and the handles used for cleanup bookkeeping.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device request descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Stable recipe identity, used to create instances
    pub uuid: String,
    /// Human-readable name (e.g., "Pixel_5")
    pub name: String,
}

impl Recipe {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
        }
    }

    /// Create a recipe with a freshly generated identity
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name)
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recipe of {} ({})", self.name, self.uuid)
    }
}

/// Instance state as reported by the cloud provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    /// Instance is being provisioned
    Creating,
    /// Instance is starting up
    Starting,
    /// Android is booting
    Booting,
    /// Instance is online and ready
    Online,
    /// Instance is shutting down
    Stopping,
    /// Instance was deleted
    Deleted,
    /// Unknown state
    Unknown,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Creating => "CREATING",
            InstanceState::Starting => "STARTING",
            InstanceState::Booting => "BOOTING",
            InstanceState::Online => "ONLINE",
            InstanceState::Stopping => "STOPPING",
            InstanceState::Deleted => "DELETED",
            InstanceState::Unknown => "UNKNOWN",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, InstanceState::Online)
    }
}

/// Snapshot of a cloud emulator instance
///
/// Every fetch from the lookup service yields a new snapshot; callers keep the
/// latest one they have seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    /// Stable cloud identity
    pub uuid: String,
    /// Instance name given by the provider
    pub name: String,
    /// Network address used for ADB (e.g., "localhost:5555")
    pub adb_name: String,
    /// Provider-reported state
    pub state: InstanceState,
    /// Whether the local ADB server is connected to the instance
    pub adb_connected: bool,
}

impl Instance {
    /// Check if the instance has finished booting
    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }

    /// Check if ADB is connected
    pub fn is_adb_connected(&self) -> bool {
        self.adb_connected
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.uuid, self.adb_name, self.state.as_str())
    }
}

/// Cleanup bookkeeping unit
///
/// Carries only the identity of an instance owned by this process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceHandle {
    pub uuid: String,
}

impl InstanceHandle {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self { uuid: uuid.into() }
    }
}

impl From<&Instance> for InstanceHandle {
    fn from(instance: &Instance) -> Self {
        Self::new(instance.uuid.clone())
    }
}

/// Outcome of the synchronized lookup-or-create decision
#[derive(Debug, Clone)]
pub struct AllocationResult {
    pub instance: Instance,
    /// `true` when no free instance existed and this call created one
    pub is_new: bool,
}

impl fmt::Display for AllocationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = if self.is_new { "new" } else { "free" };
        write!(f, "{} instance {}", origin, self.instance)
    }
}
