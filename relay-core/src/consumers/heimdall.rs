use futures_util::StreamExt;
use relay_sdk::objects::HeimdallMsg;
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::{ConsumerError, shutdown_requested};
use crate::broadcaster::{ConsensusChainClient, HeimdallBroadcaster};
use crate::queue::{Acknowledger, Envelope, EnvelopeAction, EnvelopeStream};
use crate::signer::RelayerSigner;

/// Drains the heimdall queue into the consensus chain.
///
/// The account sequence is read once when the loop starts and lives in this
/// loop only. The loop ends on the first message it cannot decode or
/// broadcast, rejecting that message without requeue; resuming requires a
/// restart, which re-reads the sequence from the chain.
pub struct HeimdallConsumer<C> {
    client: C,
    signer: RelayerSigner,
    chain_id: String,
    gas: u64,
}

impl<C: ConsensusChainClient> HeimdallConsumer<C> {
    pub fn new(client: C, signer: RelayerSigner, chain_id: impl Into<String>, gas: u64) -> Self {
        Self {
            client,
            signer,
            chain_id: chain_id.into(),
            gas,
        }
    }

    pub async fn run<A: Acknowledger>(
        self,
        mut deliveries: EnvelopeStream<A>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        let mut broadcaster =
            HeimdallBroadcaster::connect(self.client, self.signer, self.chain_id, self.gas)
                .await
                .inspect_err(|e| error!(error = %e, "Failed to read relayer account"))?;

        if *shutdown_rx.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if shutdown_requested(changed, &shutdown_rx) {
                        info!("Heimdall consumer received shutdown signal");
                        break;
                    }
                }

                delivery = deliveries.next() => {
                    let Some(delivery) = delivery else {
                        info!("Heimdall delivery stream closed");
                        break;
                    };
                    handle(&mut broadcaster, &delivery?).await?;
                }
            }
        }

        Ok(())
    }
}

async fn handle<C, A>(
    broadcaster: &mut HeimdallBroadcaster<C>,
    envelope: &Envelope<A>,
) -> Result<(), ConsumerError>
where
    C: ConsensusChainClient,
    A: Acknowledger,
{
    let reject = EnvelopeAction::Reject { requeue: false };

    let msg: HeimdallMsg = match serde_json::from_slice(&envelope.body) {
        Ok(msg) => msg,
        Err(e) => {
            error!(
                routing_key = %envelope.routing_key,
                bytes = envelope.body.len(),
                error = %e,
                "Error while decoding message for heimdall"
            );
            envelope.settle(reject).await?;
            return Err(e.into());
        }
    };

    let (tx_hash, log_index) = msg.evidence();
    let sequence = broadcaster.account().sequence();
    match broadcaster.broadcast(&msg).await {
        Ok(heimdall_tx) => {
            envelope.settle(EnvelopeAction::Ack).await?;
            debug!(
                msg_type = msg.type_name(),
                heimdall_tx = %heimdall_tx,
                sequence,
                "Acknowledged heimdall message"
            );
            Ok(())
        }
        Err(e) => {
            error!(
                msg_type = msg.type_name(),
                tx_hash = %tx_hash,
                log_index,
                sequence,
                error = %e,
                "Error while broadcasting to heimdall"
            );
            envelope.settle(reject).await?;
            Err(e.into())
        }
    }
}
