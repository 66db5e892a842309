//! Device allocator contract
//!
//! Every backend allocates through [`logged_allocation`], which brackets the
//! allocation with the `ALLOCATE_DEVICE` debug records.

use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use tracing::debug;

use droid_fleet_core::{FleetError, Result};

/// Event name attached to allocation log records
pub const ALLOCATE_DEVICE_LOG_EVT: &str = "ALLOCATE_DEVICE";

pub(crate) fn pre_allocate(query: &dyn Display) {
    debug!(
        event = ALLOCATE_DEVICE_LOG_EVT,
        "Trying to allocate a device based on \"{}\"", query
    );
}

pub(crate) fn post_allocate(query: &dyn Display, device: &dyn Display) {
    debug!(event = ALLOCATE_DEVICE_LOG_EVT, query = %query, "Settled on {}", device);
}

/// Run `allocate` between the pre- and post-allocation log records.
///
/// The post record is only written when `allocate` succeeds.
pub async fn logged_allocation<Q, D, F, Fut>(query: &Q, allocate: F) -> Result<D>
where
    Q: Display + ?Sized,
    D: Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<D>>,
{
    pre_allocate(&query);
    let device = allocate().await?;
    post_allocate(&query, &device);
    Ok(device)
}

/// Allocates a device for a query
#[async_trait]
pub trait DeviceAllocator: Send + Sync {
    type Query: Display + Send + Sync;
    type Device: Display + Send;

    /// Allocate a device, logging the query and the device settled on
    async fn allocate_device(&self, query: &Self::Query) -> Result<Self::Device> {
        logged_allocation(query, || self.do_allocate_device(query)).await
    }

    /// Backend-specific allocation
    async fn do_allocate_device(&self, _query: &Self::Query) -> Result<Self::Device> {
        Err(FleetError::NotImplemented("do_allocate_device"))
    }
}
