//! Sends child-chain calls as signed legacy transactions.

use alloy::consensus::{TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, B256, ChainId, TxKind};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportError;
use async_trait::async_trait;
use relay_sdk::objects::ChildChainCall;
use thiserror::Error;
use tracing::{debug, info};

use crate::signer::{RelayerSigner, SignerError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("child chain rpc error: {0}")]
    Rpc(#[from] TransportError),

    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),
}

/// The child-chain RPC calls needed to send a transaction.
#[async_trait]
pub trait ChildChainClient: Send + Sync {
    async fn pending_nonce(&self, address: Address) -> Result<u64, DispatchError>;
    async fn gas_price(&self) -> Result<u128, DispatchError>;
    async fn estimate_gas(&self, from: Address, call: &ChildChainCall)
    -> Result<u64, DispatchError>;
    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256, DispatchError>;
}

/// [`ChildChainClient`] over an alloy provider.
#[derive(Debug, Clone)]
pub struct AlloyChildChain<P> {
    provider: P,
}

impl<P> AlloyChildChain<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider + Send + Sync> ChildChainClient for AlloyChildChain<P> {
    async fn pending_nonce(&self, address: Address) -> Result<u64, DispatchError> {
        Ok(self
            .provider
            .get_transaction_count(address)
            .pending()
            .await?)
    }

    async fn gas_price(&self) -> Result<u128, DispatchError> {
        Ok(self.provider.get_gas_price().await?)
    }

    async fn estimate_gas(
        &self,
        from: Address,
        call: &ChildChainCall,
    ) -> Result<u64, DispatchError> {
        let request = TransactionRequest::default()
            .with_from(from)
            .with_to(call.to)
            .with_value(call.value)
            .with_input(call.data.clone());
        Ok(self.provider.estimate_gas(&request).await?)
    }

    async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256, DispatchError> {
        let pending = self.provider.send_raw_transaction(encoded).await?;
        Ok(*pending.tx_hash())
    }
}

/// Nonce and gas parameters resolved for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxAuth {
    pub from: Address,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

pub struct BorDispatcher<C> {
    client: C,
    signer: RelayerSigner,
    chain_id: Option<ChainId>,
}

impl<C: ChildChainClient> BorDispatcher<C> {
    /// `chain_id` of `None` signs with the pre-EIP-155 scheme.
    pub fn new(client: C, signer: RelayerSigner, chain_id: Option<ChainId>) -> Self {
        Self {
            client,
            signer,
            chain_id,
        }
    }

    /// Resolve the pending nonce, gas price, and gas limit for `call`.
    pub async fn auth(&self, call: &ChildChainCall) -> Result<TxAuth, DispatchError> {
        let from = self.signer.address();
        let nonce = self.client.pending_nonce(from).await?;
        let gas_price = self.client.gas_price().await?;
        let gas_limit = self.client.estimate_gas(from, call).await?;
        Ok(TxAuth {
            from,
            nonce,
            gas_price,
            gas_limit,
        })
    }

    pub fn build(&self, auth: &TxAuth, call: &ChildChainCall) -> TxLegacy {
        TxLegacy {
            chain_id: self.chain_id,
            nonce: auth.nonce,
            gas_price: auth.gas_price,
            gas_limit: auth.gas_limit,
            to: TxKind::Call(call.to),
            value: call.value,
            input: call.data.clone(),
        }
    }

    /// Resolve, sign, and send `call`. Returns the child-chain tx hash.
    pub async fn dispatch(&self, call: &ChildChainCall) -> Result<B256, DispatchError> {
        let auth = self.auth(call).await?;
        debug!(
            to = %call.to,
            nonce = auth.nonce,
            gas_price = auth.gas_price,
            gas_limit = auth.gas_limit,
            "Resolved child chain tx parameters"
        );

        let signed: TxEnvelope = self.signer.sign_legacy(self.build(&auth, call))?;
        let tx_hash = self
            .client
            .send_raw_transaction(&signed.encoded_2718())
            .await?;
        info!(tx_hash = %tx_hash, to = %call.to, nonce = auth.nonce, "Sent transaction to bor");
        Ok(tx_hash)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::broadcaster::tests::test_signer;
    use alloy::eips::eip2718::Decodable2718;
    use alloy::primitives::{Bytes, U256, address, keccak256};
    use alloy::transports::TransportErrorKind;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct FakeBor {
        pub nonce: u64,
        pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
        pub fail_send: bool,
    }

    impl FakeBor {
        pub fn sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChildChainClient for FakeBor {
        async fn pending_nonce(&self, _address: Address) -> Result<u64, DispatchError> {
            Ok(self.nonce)
        }

        async fn gas_price(&self) -> Result<u128, DispatchError> {
            Ok(30_000_000_000)
        }

        async fn estimate_gas(
            &self,
            _from: Address,
            _call: &ChildChainCall,
        ) -> Result<u64, DispatchError> {
            Ok(50_000)
        }

        async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<B256, DispatchError> {
            if self.fail_send {
                return Err(TransportErrorKind::custom_str("nonce too low").into());
            }
            self.sent.lock().unwrap().push(encoded.to_vec());
            Ok(keccak256(encoded))
        }
    }

    pub(crate) fn call() -> ChildChainCall {
        ChildChainCall {
            to: address!("0000000000000000000000000000000000001001"),
            value: U256::ZERO,
            data: Bytes::from_static(&[0xde, 0xad]),
        }
    }

    #[tokio::test]
    async fn test_dispatch_signs_resolved_parameters() {
        let fake = FakeBor {
            nonce: 42,
            ..Default::default()
        };
        let dispatcher = BorDispatcher::new(fake.clone(), test_signer(), None);

        let tx_hash = dispatcher.dispatch(&call()).await.unwrap();

        let sent = fake.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(tx_hash, keccak256(&sent[0]));
        let envelope = TxEnvelope::decode_2718(&mut sent[0].as_slice()).unwrap();
        let legacy = envelope.as_legacy().unwrap().tx();
        assert_eq!(legacy.nonce, 42);
        assert_eq!(legacy.gas_price, 30_000_000_000);
        assert_eq!(legacy.gas_limit, 50_000);
        assert_eq!(legacy.to, TxKind::Call(call().to));
        assert_eq!(legacy.input, call().data);
        assert_eq!(legacy.chain_id, None);
    }

    #[tokio::test]
    async fn test_configured_chain_id_is_used() {
        let fake = FakeBor::default();
        let dispatcher = BorDispatcher::new(fake.clone(), test_signer(), Some(15001));
        dispatcher.dispatch(&call()).await.unwrap();

        let envelope = TxEnvelope::decode_2718(&mut fake.sent()[0].as_slice()).unwrap();
        assert_eq!(envelope.as_legacy().unwrap().tx().chain_id, Some(15001));
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let fake = FakeBor {
            fail_send: true,
            ..Default::default()
        };
        let dispatcher = BorDispatcher::new(fake, test_signer(), None);
        assert!(matches!(
            dispatcher.dispatch(&call()).await,
            Err(DispatchError::Rpc(_))
        ));
    }
}
