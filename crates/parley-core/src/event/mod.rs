//! Room notification bus.
//!
//! Provides an `EventBus` that distributes `RoomEvent` messages to all
//! subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::{EventBus, RoomSubscription};
