//! Room notification bus.
//!
//! The orchestrator publishes every reply event once; transports either
//! take the whole firehose with [`EventBus::subscribe`] or follow a single
//! room with [`EventBus::subscribe_room`]. Publishing with no subscribers is
//! a no-op.

use parley_types::event::{AgentReplyEvent, RoomEvent};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use uuid::Uuid;

/// Multi-consumer bus for room notifications.
///
/// Cloning the bus clones the sender, allowing multiple producers and
/// consumers.
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// Deltas are frequent; a capacity of 1024 suits a handful of agents.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Receive only the events published for `room_id`.
    pub fn subscribe_room(&self, room_id: Uuid) -> RoomSubscription {
        RoomSubscription {
            room_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: RoomEvent) {
        let _ = self.sender.send(event);
    }

    /// Publish `event` scoped to `room_id`.
    pub fn notify(&self, room_id: Uuid, event: AgentReplyEvent) {
        self.publish(RoomEvent::new(room_id, event));
    }
}

/// A receiver filtered to one room.
///
/// Events for other rooms are consumed and skipped. Lag is reported the
/// same way as on a raw broadcast receiver.
pub struct RoomSubscription {
    room_id: Uuid,
    receiver: broadcast::Receiver<RoomEvent>,
}

impl RoomSubscription {
    pub fn room_id(&self) -> Uuid {
        self.room_id
    }

    pub async fn recv(&mut self) -> Result<AgentReplyEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if event.room_id == self.room_id {
                return Ok(event.event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv), for draining after the
    /// publisher is done.
    pub fn try_recv(&mut self) -> Result<AgentReplyEvent, TryRecvError> {
        loop {
            let event = self.receiver.try_recv()?;
            if event.room_id == self.room_id {
                return Ok(event.event);
            }
        }
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}
