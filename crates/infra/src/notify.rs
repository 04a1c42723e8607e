//! Post-commit notification seam.

use std::sync::Arc;

use solderp_events::{EventBus, InMemoryEventBus, Notification, publish_best_effort};

/// Object-safe sink for committed facts.
///
/// Services call this only after their database transaction committed, and
/// never observe failure: a lost notification is logged and dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<B> Notifier for B
where
    B: EventBus<Notification>,
{
    fn notify(&self, notification: Notification) {
        publish_best_effort(self, notification);
    }
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Bus-backed notifier for a single process.
pub fn in_memory() -> (SharedNotifier, Arc<InMemoryEventBus<Notification>>) {
    let bus = Arc::new(InMemoryEventBus::new());
    (bus.clone() as SharedNotifier, bus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solderp_core::Ipn;

    #[test]
    fn notifications_reach_subscribers() {
        let (notifier, bus) = in_memory();
        let sub = bus.subscribe();
        notifier.notify(Notification::LowStock {
            ipn: Ipn::parse("C-100N").unwrap(),
            qty_on_hand: 1,
            reorder_point: 10,
            reorder_qty: 500,
            occurred_at: Utc::now(),
        });
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn notify_without_subscribers_does_not_panic() {
        let (notifier, _bus) = in_memory();
        notifier.notify(Notification::LowStock {
            ipn: Ipn::parse("C-100N").unwrap(),
            qty_on_hand: 1,
            reorder_point: 10,
            reorder_qty: 500,
            occurred_at: Utc::now(),
        });
    }
}
