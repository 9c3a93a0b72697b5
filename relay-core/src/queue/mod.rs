//! Broker plumbing.
//!
//! Consumers never touch `lapin` types directly: a delivery is lifted into an
//! [`Envelope`] whose acknowledgement goes through the [`Acknowledger`] seam,
//! so every consumption loop runs unchanged against an in-memory stream.

mod connector;
#[cfg(test)]
pub(crate) mod testing;

pub use connector::{AmqpAcker, QueueConnector};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Errors raised by the broker layer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("connector is closed")]
    Closed,
}

/// What to do with a delivery once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeAction {
    Ack,
    Reject { requeue: bool },
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), QueueError>;
    async fn reject(&self, requeue: bool) -> Result<(), QueueError>;
}

/// A delivery taken off a queue.
#[derive(Debug)]
pub struct Envelope<A> {
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub body: Bytes,
    pub acker: A,
}

impl<A: Acknowledger> Envelope<A> {
    pub async fn settle(&self, action: EnvelopeAction) -> Result<(), QueueError> {
        match action {
            EnvelopeAction::Ack => self.acker.ack().await,
            EnvelopeAction::Reject { requeue } => self.acker.reject(requeue).await,
        }
    }
}

/// Deliveries of one queue, in broker order.
pub type EnvelopeStream<A> = BoxStream<'static, Result<Envelope<A>, QueueError>>;
