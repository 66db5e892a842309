//! Event System
//!
//! Device lifecycle notifications (`bootDevice`, `beforeShutdownDevice`,
//! `shutdownDevice`) delivered to registered subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::error::{FleetError, Result};

/// Device lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeviceEvent {
    /// Device allocated and ready
    BootDevice {
        /// `true` when the instance was created by this allocation
        cold_boot: bool,
        device_id: String,
        /// Recipe name the device was requested with
        #[serde(rename = "type")]
        device_type: String,
    },
    /// Device is about to be torn down
    BeforeShutdownDevice { device_id: String },
    /// Device was torn down
    ShutdownDevice { device_id: String },
}

impl DeviceEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceEvent::BootDevice { .. } => "bootDevice",
            DeviceEvent::BeforeShutdownDevice { .. } => "beforeShutdownDevice",
            DeviceEvent::ShutdownDevice { .. } => "shutdownDevice",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            DeviceEvent::BootDevice { device_id, .. }
            | DeviceEvent::BeforeShutdownDevice { device_id }
            | DeviceEvent::ShutdownDevice { device_id } => device_id,
        }
    }
}

/// Receives device events from an [`EventBus`]
#[async_trait]
pub trait DeviceEventSubscriber: Send + Sync {
    /// Handle one event. An error fails the emitting operation.
    async fn on_event(&self, event: &DeviceEvent) -> anyhow::Result<()>;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// A closed subscriber is dropped from the bus after the next emit
    fn is_closed(&self) -> bool {
        false
    }
}

/// Subscriber handle for receiving events
#[derive(Clone)]
pub struct EventSubscription {
    receiver: Receiver<DeviceEvent>,
}

impl EventSubscription {
    /// Receive the next event (blocking)
    pub fn recv(&self) -> std::result::Result<DeviceEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv(&self) -> std::result::Result<DeviceEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Get an iterator over events
    pub fn iter(&self) -> impl Iterator<Item = DeviceEvent> + '_ {
        self.receiver.iter()
    }
}

/// Forwards events into a channel; a dropped receiver closes it
struct ChannelSubscriber {
    sender: Sender<DeviceEvent>,
    closed: AtomicBool,
}

#[async_trait]
impl DeviceEventSubscriber for ChannelSubscriber {
    async fn on_event(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        if self.sender.send(event.clone()).is_err() {
            self.closed.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Event bus for publish/subscribe pattern
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn DeviceEventSubscriber>>>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Register a subscriber
    pub fn register(&self, subscriber: Arc<dyn DeviceEventSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Subscribe to events through a channel
    pub fn subscribe(&self) -> EventSubscription {
        let (sender, receiver) = unbounded();
        self.register(Arc::new(ChannelSubscriber {
            sender,
            closed: AtomicBool::new(false),
        }));
        EventSubscription { receiver }
    }

    /// Emit an event to all subscribers and wait for every one of them.
    ///
    /// Subscribers run concurrently. Returns the number of live subscribers
    /// reached, or the first subscriber failure once all of them have finished.
    /// Subscribers that turned out closed are removed.
    pub async fn emit(&self, event: DeviceEvent) -> Result<usize> {
        let subscribers: Vec<_> = self.subscribers.read().clone();

        let outcomes = join_all(subscribers.iter().map(|subscriber| {
            let event = &event;
            async move { (subscriber.name(), subscriber.on_event(event).await) }
        }))
        .await;

        let closed = subscribers.iter().filter(|s| s.is_closed()).count();
        if closed > 0 {
            debug!("Dropping {} closed subscribers", closed);
            self.subscribers.write().retain(|s| !s.is_closed());
        }

        for (subscriber, outcome) in outcomes {
            if let Err(err) = outcome {
                debug!("Subscriber {} failed on {}: {:#}", subscriber, event.name(), err);
                return Err(FleetError::upstream("emit", event.name(), err));
            }
        }

        let delivered = subscribers.len() - closed;
        debug!("Event {:?} delivered to {} subscribers", event, delivered);
        Ok(delivered)
    }

    /// Get the number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
