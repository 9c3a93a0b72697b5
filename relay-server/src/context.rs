//! Everything the relay components are built from, constructed once at
//! startup.

use crate::config::runtime::RelayConfig;
use alloy::providers::Provider;
use relay_core::consumers::{BorConsumer, HeimdallConsumer, TaskConsumer};
use relay_core::dispatcher::{AlloyChildChain, BorDispatcher};
use relay_core::gate::RestIdempotencyGate;
use relay_core::processors::{
    ClerkProcessor, FeeProcessor, MessageContext, TaskRegistry, TxBroadcaster,
};
use relay_core::signer::RelayerSigner;
use relay_sdk::client::HeimdallClient;
use std::sync::Arc;

pub struct RelayContext<P> {
    pub config: RelayConfig,
    pub signer: RelayerSigner,
    /// REST client of the consensus chain.
    pub heimdall: HeimdallClient,
    /// JSON-RPC provider of the child chain.
    pub bor: P,
}

impl<P: Provider + Clone + 'static> RelayContext<P> {
    pub fn new(config: RelayConfig, signer: RelayerSigner, bor: P) -> Self {
        let heimdall = HeimdallClient::new(config.heimdall.rest_url.clone());
        Self {
            config,
            signer,
            heimdall,
            bor,
        }
    }

    pub fn message_context(&self) -> MessageContext {
        MessageContext {
            from: self.signer.address(),
            bor_chain_id: self
                .config
                .bor
                .chain_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        }
    }

    /// Every processor, each sending through `broadcaster`.
    pub fn task_registry<B>(&self, broadcaster: B) -> TaskRegistry
    where
        B: TxBroadcaster + Clone + 'static,
    {
        let gate = Arc::new(RestIdempotencyGate::new(self.heimdall.clone()));
        TaskRegistry::new()
            .register(FeeProcessor::new(
                gate.clone(),
                broadcaster.clone(),
                self.message_context(),
            ))
            .register(ClerkProcessor::new(
                gate,
                broadcaster,
                self.message_context(),
            ))
    }

    pub fn heimdall_consumer(&self) -> HeimdallConsumer<HeimdallClient> {
        HeimdallConsumer::new(
            self.heimdall.clone(),
            self.signer.clone(),
            self.config.heimdall.chain_id.clone(),
            self.config.heimdall.gas,
        )
    }

    pub fn bor_consumer(&self) -> BorConsumer<AlloyChildChain<P>> {
        BorConsumer::new(BorDispatcher::new(
            AlloyChildChain::new(self.bor.clone()),
            self.signer.clone(),
            self.config.bor.chain_id,
        ))
    }

    pub fn task_consumer<B>(&self, broadcaster: B) -> TaskConsumer
    where
        B: TxBroadcaster + Clone + 'static,
    {
        TaskConsumer::new(self.task_registry(broadcaster), self.config.retry_delay)
    }
}
