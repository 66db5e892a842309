//! Error types for Droid Fleet
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Boxed error carried through from an external collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for Droid Fleet
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("{0} is not implemented for this allocator")]
    NotImplemented(&'static str),

    #[error("Timeout waiting for instance {uuid} to be ready ({attempts} attempts)")]
    AllocationTimeout { uuid: String, attempts: u32 },

    #[error("{operation} failed for {target}: {source}")]
    Upstream {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("Cleanup registry error: {0}")]
    CleanupRegistry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for Droid Fleet operations
pub type Result<T> = std::result::Result<T, FleetError>;

impl FleetError {
    /// Wrap a failure reported by a lookup/lifecycle service or event subscriber
    pub fn upstream(
        operation: &'static str,
        target: impl Into<String>,
        err: anyhow::Error,
    ) -> Self {
        FleetError::Upstream {
            operation,
            target: target.into(),
            source: err.into(),
        }
    }

    /// Check if this error is a boot-wait timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, FleetError::AllocationTimeout { .. })
    }
}
