use std::time::Duration;

use futures_util::StreamExt;
use relay_sdk::objects::EventTask;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{ConsumerError, shutdown_requested};
use crate::processors::{TaskOutcome, TaskRegistry};
use crate::queue::{Acknowledger, Envelope, EnvelopeAction, EnvelopeStream};

/// Drains the task queue through the registered processors.
///
/// Transient failures are requeued after `retry_delay`. The delay holds the
/// queue, so a requeued task is retried before any task behind it.
pub struct TaskConsumer {
    registry: TaskRegistry,
    retry_delay: Duration,
}

impl TaskConsumer {
    pub fn new(registry: TaskRegistry, retry_delay: Duration) -> Self {
        Self {
            registry,
            retry_delay,
        }
    }

    pub async fn run<A: Acknowledger>(
        self,
        mut deliveries: EnvelopeStream<A>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        if *shutdown_rx.borrow() {
            return Ok(());
        }
        info!(
            tasks = ?self.registry.task_names().collect::<Vec<_>>(),
            "Task consumer ready"
        );

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if shutdown_requested(changed, &shutdown_rx) {
                        info!("Task consumer received shutdown signal");
                        break;
                    }
                }

                delivery = deliveries.next() => {
                    let Some(delivery) = delivery else {
                        info!("Task delivery stream closed");
                        break;
                    };
                    let envelope = delivery?;
                    let action = self.handle(&envelope).await;
                    if action == (EnvelopeAction::Reject { requeue: true }) {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    envelope.settle(action).await?;
                }
            }
        }

        Ok(())
    }

    async fn handle<A>(&self, envelope: &Envelope<A>) -> EnvelopeAction {
        let task: EventTask = match serde_json::from_slice(&envelope.body) {
            Ok(task) => task,
            Err(e) => {
                error!(
                    routing_key = %envelope.routing_key,
                    bytes = envelope.body.len(),
                    error = %e,
                    "Error while decoding event task"
                );
                return EnvelopeAction::Reject { requeue: false };
            }
        };

        let outcome = self.registry.dispatch(&task).await;
        match &outcome {
            TaskOutcome::Dispatched => {
                debug!(task = %task.name, event = %task.event_name, "Task dispatched");
            }
            TaskOutcome::AlreadyProcessed => {
                debug!(task = %task.name, event = %task.event_name, "Task already processed");
            }
            TaskOutcome::Failed(failure) if failure.is_transient() => {
                warn!(
                    task = %task.name,
                    event = %task.event_name,
                    redelivered = envelope.redelivered,
                    retry_in = ?self.retry_delay,
                    error = %failure,
                    "Task failed, requeueing"
                );
            }
            TaskOutcome::Failed(failure) => {
                error!(
                    task = %task.name,
                    event = %task.event_name,
                    error = %failure,
                    "Task failed permanently, dropping it"
                );
            }
        }
        outcome.envelope_action()
    }
}
