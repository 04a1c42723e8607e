//! Notifications emitted after committed inventory and order changes.
//!
//! Delivery is fire-and-forget: the database is the source of truth, and a
//! dropped notification never rolls back the change that produced it.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription, publish_best_effort};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::Notification;
