//! Signs and submits consensus-chain transactions.
//!
//! The broadcaster owns the relayer account's sequence. It is driven by a
//! single consumer, so each sequence value is used at most once and the
//! sequence only advances after the chain accepted a transaction.

use alloy::primitives::Address;
use async_trait::async_trait;
use fast32::base64::RFC4648_NOPAD;
use relay_sdk::client::{ClientError, HeimdallClient};
use relay_sdk::objects::{
    BaseAccount, BroadcastMode, BroadcastTxResponse, HeimdallMsg, StdFee, StdSignDoc, StdTx, Tx,
};
use ring::digest::{SHA256, digest};
use thiserror::Error;
use tracing::{debug, info};

use crate::signer::{RelayerSigner, SignerError};

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("consensus chain request failed: {0}")]
    Client(#[from] ClientError),

    #[error("message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("signing failed: {0}")]
    Signing(#[from] SignerError),

    #[error("transaction rejected with code {code}: {log}")]
    Rejected { code: u32, log: String },
}

/// The consensus-chain operations the broadcaster depends on.
#[async_trait]
pub trait ConsensusChainClient: Send + Sync {
    async fn fetch_account(&self, address: Address) -> Result<BaseAccount, BroadcastError>;
    async fn submit_tx(&self, tx: Tx) -> Result<BroadcastTxResponse, BroadcastError>;
}

#[async_trait]
impl ConsensusChainClient for HeimdallClient {
    async fn fetch_account(&self, address: Address) -> Result<BaseAccount, BroadcastError> {
        Ok(self.account(address).await?)
    }

    async fn submit_tx(&self, tx: Tx) -> Result<BroadcastTxResponse, BroadcastError> {
        Ok(self.broadcast_tx(tx, BroadcastMode::Async).await?)
    }
}

/// Account number and next unused sequence of the relayer account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSequence {
    account_number: u64,
    sequence: u64,
}

impl AccountSequence {
    pub fn new(account_number: u64, sequence: u64) -> Self {
        Self {
            account_number,
            sequence,
        }
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    fn advance(&mut self) {
        self.sequence += 1;
    }
}

/// Builds, signs, and submits one transaction per message.
pub struct HeimdallBroadcaster<C> {
    client: C,
    signer: RelayerSigner,
    chain_id: String,
    gas: u64,
    account: AccountSequence,
}

impl<C: ConsensusChainClient> HeimdallBroadcaster<C> {
    pub fn new(
        client: C,
        signer: RelayerSigner,
        chain_id: impl Into<String>,
        gas: u64,
        account: AccountSequence,
    ) -> Self {
        Self {
            client,
            signer,
            chain_id: chain_id.into(),
            gas,
            account,
        }
    }

    /// Read the relayer account from the chain and start from its sequence.
    pub async fn connect(
        client: C,
        signer: RelayerSigner,
        chain_id: impl Into<String>,
        gas: u64,
    ) -> Result<Self, BroadcastError> {
        let account = client.fetch_account(signer.address()).await?;
        info!(
            address = %signer.address(),
            account_number = account.account_number,
            sequence = account.sequence,
            "Loaded relayer account"
        );
        let account = AccountSequence::new(account.account_number, account.sequence);
        Ok(Self::new(client, signer, chain_id, gas, account))
    }

    pub fn account(&self) -> AccountSequence {
        self.account
    }

    /// Sign and submit `msg`, returning the transaction hash.
    pub async fn broadcast(&mut self, msg: &HeimdallMsg) -> Result<String, BroadcastError> {
        let msg = serde_json::to_value(msg)?;
        self.submit(msg).await
    }

    /// Sign and submit a message that is already JSON-encoded in its typed
    /// envelope form.
    ///
    /// For callers that hold the encoded message of a type this crate does not
    /// model. The heimdall consumer decodes into [`HeimdallMsg`] first and uses
    /// [`broadcast`](Self::broadcast), so unknown message types never reach
    /// the chain from the queue.
    pub async fn broadcast_bytes(&mut self, data: &[u8]) -> Result<String, BroadcastError> {
        let msg: serde_json::Value = serde_json::from_slice(data)?;
        self.submit(msg).await
    }

    async fn submit(&mut self, msg: serde_json::Value) -> Result<String, BroadcastError> {
        let tx = self.sign(msg)?;
        let local_hash = tx_hash(&tx)?;
        debug!(
            tx_hash = %local_hash,
            sequence = self.account.sequence(),
            "Submitting transaction"
        );

        let response = self.client.submit_tx(tx).await?;
        if let Some(code) = response.code.filter(|_| response.is_rejected()) {
            return Err(BroadcastError::Rejected {
                code,
                log: response.raw_log.unwrap_or_default(),
            });
        }

        let used = self.account.sequence();
        self.account.advance();
        let tx_hash = if response.txhash.is_empty() {
            local_hash
        } else {
            response.txhash
        };
        info!(tx_hash = %tx_hash, sequence = used, "Broadcast transaction to heimdall");
        Ok(tx_hash)
    }

    fn sign(&self, msg: serde_json::Value) -> Result<Tx, BroadcastError> {
        let doc = StdSignDoc {
            account_number: self.account.account_number(),
            chain_id: self.chain_id.clone(),
            fee: StdFee::with_gas(self.gas),
            memo: String::new(),
            msgs: vec![msg.clone()],
            sequence: self.account.sequence(),
        };
        let signature = self.signer.sign_recoverable(&doc.sign_bytes()?)?;
        Ok(Tx::Std(StdTx {
            msg,
            signature: RFC4648_NOPAD.encode(&signature),
            memo: doc.memo,
        }))
    }
}

/// Upper-case hex SHA-256 of the encoded transaction.
fn tx_hash(tx: &Tx) -> Result<String, serde_json::Error> {
    let encoded = serde_json::to_vec(tx)?;
    Ok(hex::encode_upper(digest(&SHA256, &encoded)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::primitives::{B256, U256, address, keccak256};
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
    use relay_sdk::objects::MsgTopup;
    use std::sync::{Arc, Mutex};

    pub(crate) const CHAIN_ID: &str = "heimdall-test";
    pub(crate) const GAS: u64 = 200_000;
    pub(crate) const ACCOUNT_NUMBER: u64 = 4;

    pub(crate) fn test_signer() -> RelayerSigner {
        RelayerSigner::from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
            .unwrap()
    }

    /// Records submitted transactions; optionally refuses the n-th one.
    #[derive(Clone, Default)]
    pub(crate) struct FakeHeimdall {
        pub sequence: u64,
        pub submitted: Arc<Mutex<Vec<StdTx>>>,
        pub fail_at: Option<usize>,
        pub reject_code: Option<u32>,
    }

    impl FakeHeimdall {
        pub fn at_sequence(sequence: u64) -> Self {
            Self {
                sequence,
                ..Default::default()
            }
        }

        pub fn submitted(&self) -> Vec<StdTx> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ConsensusChainClient for FakeHeimdall {
        async fn fetch_account(&self, address: Address) -> Result<BaseAccount, BroadcastError> {
            Ok(BaseAccount {
                address,
                account_number: ACCOUNT_NUMBER,
                sequence: self.sequence,
            })
        }

        async fn submit_tx(&self, tx: Tx) -> Result<BroadcastTxResponse, BroadcastError> {
            let mut submitted = self.submitted.lock().unwrap();
            if self.fail_at == Some(submitted.len()) {
                return Err(BroadcastError::Client(ClientError::Api {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: "unavailable".to_string(),
                }));
            }
            let Tx::Std(std_tx) = tx;
            submitted.push(std_tx);
            Ok(BroadcastTxResponse {
                height: None,
                txhash: String::new(),
                code: self.reject_code,
                raw_log: self.reject_code.map(|_| "signature verification failed".to_string()),
            })
        }
    }

    /// The sequence a transaction was signed with, found by recovering the
    /// signer over each candidate sign document.
    pub(crate) fn signed_sequence(tx: &StdTx, signer: &RelayerSigner) -> Option<u64> {
        let signature = RFC4648_NOPAD.decode_str(&tx.signature).ok()?;
        let rs = Signature::from_slice(&signature[..64]).ok()?;
        let recovery_id = RecoveryId::from_byte(signature[64])?;
        (0..1_000).find(|&sequence| {
            let doc = StdSignDoc {
                account_number: ACCOUNT_NUMBER,
                chain_id: CHAIN_ID.to_string(),
                fee: StdFee::with_gas(GAS),
                memo: String::new(),
                msgs: vec![tx.msg.clone()],
                sequence,
            };
            let digest = keccak256(doc.sign_bytes().unwrap());
            VerifyingKey::recover_from_prehash(digest.as_slice(), &rs, recovery_id)
                .is_ok_and(|key| &key == signer.verifying_key())
        })
    }

    pub(crate) fn topup(log_index: u64) -> HeimdallMsg {
        HeimdallMsg::Topup(MsgTopup {
            from_address: address!("00000000000000000000000000000000000000aa"),
            id: 7,
            fee: U256::from(1_000_000_000_000_000_000u128),
            tx_hash: B256::repeat_byte(0x11),
            log_index,
        })
    }

    async fn broadcaster(fake: FakeHeimdall) -> HeimdallBroadcaster<FakeHeimdall> {
        HeimdallBroadcaster::connect(fake, test_signer(), CHAIN_ID, GAS)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_reads_account() {
        let b = broadcaster(FakeHeimdall::at_sequence(31)).await;
        assert_eq!(b.account(), AccountSequence::new(ACCOUNT_NUMBER, 31));
    }

    #[tokio::test]
    async fn test_sequence_advances_once_per_success() {
        let fake = FakeHeimdall::at_sequence(10);
        let mut b = broadcaster(fake.clone()).await;

        for log_index in 0..3 {
            b.broadcast(&topup(log_index)).await.unwrap();
        }

        assert_eq!(b.account().sequence(), 13);
        let sequences: Vec<_> = fake
            .submitted()
            .iter()
            .map(|tx| signed_sequence(tx, &test_signer()).unwrap())
            .collect();
        assert_eq!(sequences, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_sequence() {
        let fake = FakeHeimdall {
            sequence: 5,
            fail_at: Some(0),
            ..Default::default()
        };
        let mut b = broadcaster(fake).await;
        assert!(matches!(
            b.broadcast(&topup(0)).await,
            Err(BroadcastError::Client(_))
        ));
        assert_eq!(b.account().sequence(), 5);
    }

    #[tokio::test]
    async fn test_rejected_tx_keeps_sequence() {
        let fake = FakeHeimdall {
            sequence: 5,
            reject_code: Some(4),
            ..Default::default()
        };
        let mut b = broadcaster(fake).await;
        match b.broadcast(&topup(0)).await {
            Err(BroadcastError::Rejected { code, log }) => {
                assert_eq!(code, 4);
                assert_eq!(log, "signature verification failed");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(b.account().sequence(), 5);
    }

    #[tokio::test]
    async fn test_broadcast_bytes_submits_message_verbatim() {
        let fake = FakeHeimdall::at_sequence(0);
        let mut b = broadcaster(fake.clone()).await;
        let data = serde_json::to_vec(&topup(9)).unwrap();

        let hash = b.broadcast_bytes(&data).await.unwrap();

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| !c.is_ascii_lowercase()));
        let submitted = fake.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].msg, serde_json::to_value(topup(9)).unwrap());
    }

    #[tokio::test]
    async fn test_broadcast_bytes_rejects_invalid_json() {
        let fake = FakeHeimdall::at_sequence(0);
        let mut b = broadcaster(fake.clone()).await;
        assert!(matches!(
            b.broadcast_bytes(b"\x00\x01").await,
            Err(BroadcastError::Encoding(_))
        ));
        assert!(fake.submitted().is_empty());
        assert_eq!(b.account().sequence(), 0);
    }
}
