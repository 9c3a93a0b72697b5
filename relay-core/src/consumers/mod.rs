//! The three consumption loops.
//!
//! Each loop is the only reader of its queue and finishes one delivery,
//! through ack or reject, before it takes the next. All of them stop when
//! the shutdown signal flips or their delivery stream ends.

mod bor;
mod heimdall;
mod tasks;

pub use bor::BorConsumer;
pub use heimdall::HeimdallConsumer;
pub use tasks::TaskConsumer;

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::broadcaster::BroadcastError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("broadcast failed: {0}")]
    Broadcast(#[from] BroadcastError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Running,
    Stopped,
    Failed,
}

impl ConsumerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

/// A spawned consumption loop.
pub struct ConsumerHandle {
    name: &'static str,
    state: watch::Receiver<ConsumerState>,
    join: JoinHandle<()>,
}

/// Spawn `run` and publish its state: `running` until it returns, then
/// `stopped` on `Ok` or `failed` on `Err`.
pub fn spawn_consumer<F>(name: &'static str, run: F) -> ConsumerHandle
where
    F: Future<Output = Result<(), ConsumerError>> + Send + 'static,
{
    let (state_tx, state) = watch::channel(ConsumerState::Running);
    let join = tokio::spawn(async move {
        info!(consumer = name, "Consumer started");
        match run.await {
            Ok(()) => {
                info!(consumer = name, "Consumer stopped");
                state_tx.send_replace(ConsumerState::Stopped);
            }
            Err(e) => {
                error!(
                    consumer = name,
                    error = %e,
                    "Consumer terminated, restart the relay to resume this queue"
                );
                state_tx.send_replace(ConsumerState::Failed);
            }
        }
    });
    ConsumerHandle { name, state, join }
}

/// Live view of every consumer's state.
#[derive(Debug, Clone)]
pub struct ConsumerStatus {
    consumers: Vec<(&'static str, watch::Receiver<ConsumerState>)>,
}

impl ConsumerStatus {
    pub fn states(&self) -> Vec<(&'static str, ConsumerState)> {
        self.consumers
            .iter()
            .map(|(name, state)| (*name, *state.borrow()))
            .collect()
    }

    pub fn all_running(&self) -> bool {
        self.consumers
            .iter()
            .all(|(_, state)| *state.borrow() == ConsumerState::Running)
    }
}

/// The heimdall, bor, and task consumers started together.
pub struct ConsumerHandles {
    handles: Vec<ConsumerHandle>,
}

impl ConsumerHandles {
    pub fn new(heimdall: ConsumerHandle, bor: ConsumerHandle, tasks: ConsumerHandle) -> Self {
        Self {
            handles: vec![heimdall, bor, tasks],
        }
    }

    pub fn status(&self) -> ConsumerStatus {
        ConsumerStatus {
            consumers: self
                .handles
                .iter()
                .map(|h| (h.name, h.state.clone()))
                .collect(),
        }
    }

    /// Wait for every loop to return.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.join.await {
                warn!(consumer = handle.name, error = %e, "Consumer task panicked");
            }
        }
    }
}

/// Whether the loop should stop; a dropped sender counts as shutdown.
fn shutdown_requested(changed: Result<(), watch::error::RecvError>, rx: &watch::Receiver<bool>) -> bool {
    changed.is_err() || *rx.borrow()
}
