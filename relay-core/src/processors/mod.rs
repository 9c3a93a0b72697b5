//! Event processors.
//!
//! A processor turns one [`EventTask`] into at most one consensus-chain
//! message. Every task ends in a [`TaskOutcome`], and the outcome alone
//! decides what happens to the delivery that carried it.

mod clerk;
mod event;
mod fee;
mod registry;

pub use clerk::{ClerkProcessor, StateSynced};
pub use event::{BridgeEvent, EventLog, EventProcessor, MessageContext};
pub use fee::{FeeProcessor, TopUpFee};
pub use registry::TaskRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use relay_sdk::objects::{EventTask, HeimdallMsg};
use thiserror::Error;

use crate::gate::GateError;
use crate::queue::{EnvelopeAction, QueueError};

/// Where processors send the messages they build.
#[async_trait]
pub trait TxBroadcaster: Send + Sync {
    async fn broadcast_to_heimdall(&self, msg: &HeimdallMsg) -> Result<(), QueueError>;
}

#[async_trait]
impl<T: TxBroadcaster + ?Sized> TxBroadcaster for Arc<T> {
    async fn broadcast_to_heimdall(&self, msg: &HeimdallMsg) -> Result<(), QueueError> {
        (**self).broadcast_to_heimdall(msg).await
    }
}

/// Why a task did not produce a message.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("malformed task payload: {0}")]
    Malformed(String),

    #[error("failed to unpack {event}: {reason}")]
    Unpack { event: String, reason: String },

    #[error("no processor registered for task {0}")]
    UnknownTask(String),

    #[error("idempotency gate unavailable: {0}")]
    GateUnavailable(#[source] GateError),

    #[error("failed to dispatch message: {0}")]
    Dispatch(#[source] QueueError),
}

impl TaskFailure {
    /// Failures that may succeed on redelivery.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::GateUnavailable(_) | Self::Dispatch(_))
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    Dispatched,
    AlreadyProcessed,
    Failed(TaskFailure),
}

impl TaskOutcome {
    pub fn envelope_action(&self) -> EnvelopeAction {
        match self {
            Self::Dispatched | Self::AlreadyProcessed => EnvelopeAction::Ack,
            Self::Failed(failure) => EnvelopeAction::Reject {
                requeue: failure.is_transient(),
            },
        }
    }
}

/// A processor registered under a task name.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn task_name(&self) -> &'static str;

    async fn handle(&self, task: &EventTask) -> TaskOutcome;
}
