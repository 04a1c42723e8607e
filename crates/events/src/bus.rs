//! Publish/subscribe abstraction for notifications (mechanics only).
//!
//! The bus distributes already-committed facts. It is not a persistence layer
//! and offers no delivery guarantee beyond best effort: publishers never wait
//! on consumers, and a failed publish is logged and dropped.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

/// A subscription to a bus. Each subscription receives a copy of every
/// message published after it was created.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently queued without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub bus.
///
/// Implementations must be `Send + Sync`: request handlers publish from many
/// threads at once.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Publish without surfacing failure to the caller.
///
/// Used after a database commit: the change already happened, so a bus error
/// is only worth a log line.
pub fn publish_best_effort<M, B>(bus: &B, message: M)
where
    B: EventBus<M> + ?Sized,
{
    if let Err(err) = bus.publish(message) {
        tracing::warn!(error = ?err, "notification dropped");
    }
}
