//! Service wiring for the HTTP layer.
//!
//! Notifications go to an in-process bus and, lossily, to a broadcast channel
//! that feeds the server-sent events stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use solderp_events::{
    EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Notification, Subscription,
};
use solderp_infra::{Config, Services, ServiceResult, SharedNotifier, SqlitePool};
use solderp_invoicing::TaxRate;

const REALTIME_CAPACITY: usize = 256;

/// Bus that fans notifications out to in-process subscribers and to SSE
/// clients. A slow SSE client misses messages; it never blocks a publisher.
#[derive(Debug)]
pub struct RealtimeBus {
    inner: InMemoryEventBus<Notification>,
    realtime_tx: broadcast::Sender<Notification>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        let (realtime_tx, _realtime_rx) = broadcast::channel(REALTIME_CAPACITY);
        Self {
            inner: InMemoryEventBus::new(),
            realtime_tx,
        }
    }

    pub fn realtime(&self) -> broadcast::Receiver<Notification> {
        self.realtime_tx.subscribe()
    }
}

impl Default for RealtimeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus<Notification> for RealtimeBus {
    type Error = InMemoryBusError;

    fn publish(&self, message: Notification) -> Result<(), Self::Error> {
        // No SSE client connected is not an error.
        let _ = self.realtime_tx.send(message.clone());
        self.inner.publish(message)
    }

    fn subscribe(&self) -> Subscription<Notification> {
        self.inner.subscribe()
    }
}

/// Everything a handler needs.
pub struct AppServices {
    pub core: Services,
    bus: Arc<RealtimeBus>,
}

impl AppServices {
    pub fn new(pool: SqlitePool, tax: TaxRate) -> Self {
        let bus = Arc::new(RealtimeBus::new());
        let notifier: SharedNotifier = bus.clone();
        Self {
            core: Services::new(pool, notifier, tax),
            bus,
        }
    }

    pub fn bus(&self) -> &Arc<RealtimeBus> {
        &self.bus
    }
}

/// Connect to the configured database and build the services.
pub async fn build_services(config: &Config) -> ServiceResult<AppServices> {
    let pool = solderp_infra::db::connect(&config.database).await?;
    Ok(AppServices::new(pool, config.invoice_tax))
}

/// Server-sent events: one enveloped notification per message, named by its
/// event type and identified by the envelope id.
pub fn notification_sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.bus.realtime();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(n) => {
            let envelope = EventEnvelope::wrap(n);
            let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default()
                .event(envelope.event_type())
                .id(envelope.event_id().to_string())
                .data(data)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use solderp_core::Ipn;

    fn low_stock() -> Notification {
        Notification::LowStock {
            ipn: Ipn::parse("U-LM358").unwrap(),
            qty_on_hand: 2,
            reorder_point: 10,
            reorder_qty: 250,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn publish_reaches_both_sinks() {
        let bus = RealtimeBus::new();
        let mut realtime = bus.realtime();
        let sub = bus.subscribe();

        let sent = low_stock();
        bus.publish(sent.clone()).unwrap();

        assert_eq!(realtime.try_recv().unwrap(), sent);
        assert_eq!(sub.try_recv().unwrap(), sent);
    }

    #[test]
    fn publish_without_sse_clients_succeeds() {
        let bus = RealtimeBus::new();
        assert!(bus.publish(low_stock()).is_ok());
    }
}
