use futures_util::StreamExt;
use relay_sdk::objects::ChildChainCall;
use tokio::sync::watch;
use tracing::{error, info};

use super::{ConsumerError, shutdown_requested};
use crate::dispatcher::{BorDispatcher, ChildChainClient};
use crate::queue::{Acknowledger, Envelope, EnvelopeAction, EnvelopeStream};

/// Drains the bor queue into the child chain.
///
/// Every delivery is settled exactly once and never requeued: a call that
/// cannot be decoded or sent is logged and dropped, and the loop moves on.
pub struct BorConsumer<C> {
    dispatcher: BorDispatcher<C>,
}

impl<C: ChildChainClient> BorConsumer<C> {
    pub fn new(dispatcher: BorDispatcher<C>) -> Self {
        Self { dispatcher }
    }

    pub async fn run<A: Acknowledger>(
        self,
        mut deliveries: EnvelopeStream<A>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if shutdown_requested(changed, &shutdown_rx) {
                        info!("Bor consumer received shutdown signal");
                        break;
                    }
                }

                delivery = deliveries.next() => {
                    let Some(delivery) = delivery else {
                        info!("Bor delivery stream closed");
                        break;
                    };
                    let envelope = delivery?;
                    let action = self.handle(&envelope).await;
                    envelope.settle(action).await?;
                }
            }
        }

        Ok(())
    }

    async fn handle<A>(&self, envelope: &Envelope<A>) -> EnvelopeAction {
        let discard = EnvelopeAction::Reject { requeue: false };

        let call: ChildChainCall = match serde_json::from_slice(&envelope.body) {
            Ok(call) => call,
            Err(e) => {
                error!(
                    routing_key = %envelope.routing_key,
                    bytes = envelope.body.len(),
                    error = %e,
                    "Error while parsing the transaction from queue"
                );
                return discard;
            }
        };

        match self.dispatcher.dispatch(&call).await {
            Ok(_) => EnvelopeAction::Ack,
            Err(e) => {
                error!(
                    to = %call.to,
                    value = %call.value,
                    data_len = call.data.len(),
                    error = %e,
                    "Error while sending transaction to bor, dropping it"
                );
                discard
            }
        }
    }
}
