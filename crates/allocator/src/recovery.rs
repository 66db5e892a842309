//! Orphaned instance recovery
//!
//! Deletes instances whose handles are still in the cleanup registry, e.g.
//! after a previous run died between creating and releasing them.

use tracing::{info, warn};

use droid_fleet_core::Result;
use droid_fleet_registry::CleanupRegistry;

use crate::service::InstanceLifecycleService;

/// Outcome of a recovery pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Instances deleted and dropped from the registry
    pub deleted: Vec<String>,
    /// Instances that could not be deleted, with the reason; their handles stay registered
    pub failed: Vec<(String, String)>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete every instance still registered for cleanup.
///
/// Deletion failures are reported, not returned; registry failures are returned.
pub async fn recover_orphaned_instances(
    cleanup: &dyn CleanupRegistry,
    lifecycle: &dyn InstanceLifecycleService,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    for handle in cleanup.handles().await? {
        match lifecycle.delete_instance(&handle.uuid).await {
            Ok(()) => {
                cleanup.dispose_device(&handle).await?;
                info!("Deleted orphaned instance {}", handle.uuid);
                report.deleted.push(handle.uuid);
            }
            Err(err) => {
                warn!("Failed to delete orphaned instance {}: {:#}", handle.uuid, err);
                report.failed.push((handle.uuid, format!("{:#}", err)));
            }
        }
    }

    Ok(report)
}
