//! The relayer's secp256k1 identity.
//!
//! One key signs for both chains: consensus-chain transactions are signed
//! over the keccak-256 of their sign bytes with a recoverable signature, and
//! child-chain transactions are signed as legacy Ethereum transactions.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, keccak256};
use alloy::signers::Signer;
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::SigningKey;
use thiserror::Error;

/// Errors that can occur while loading a key or signing with it.
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("invalid hex in private key: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("invalid secp256k1 key or signature: {0}")]
    Key(#[from] k256::ecdsa::Error),

    #[error("transaction signing failed: {0}")]
    Transaction(#[from] alloy::signers::Error),
}

/// Signing identity of the relayer.
#[derive(Clone)]
pub struct RelayerSigner {
    key: SigningKey,
    wallet: PrivateKeySigner,
}

impl std::fmt::Debug for RelayerSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl RelayerSigner {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let wallet = PrivateKeySigner::from_signing_key(key.clone());
        Self { key, wallet }
    }

    /// Parse a hex private key, with or without a `0x` prefix.
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let trimmed = private_key.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(hex_str)?;
        let key = SigningKey::from_slice(&bytes)?;
        Ok(Self::from_signing_key(key))
    }

    /// The relayer's 20-byte address on both chains.
    pub fn address(&self) -> Address {
        Signer::address(&self.wallet)
    }

    pub fn verifying_key(&self) -> &k256::ecdsa::VerifyingKey {
        self.key.verifying_key()
    }

    /// Sign `keccak256(message)`, returning `r || s || v` with `v` in `{0, 1}`.
    pub fn sign_recoverable(&self, message: &[u8]) -> Result<[u8; 65], SignerError> {
        let digest = keccak256(message);
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(digest.as_slice())?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }

    /// Sign a legacy child-chain transaction. A transaction without a chain id
    /// is signed with the pre-EIP-155 scheme.
    pub fn sign_legacy(&self, mut tx: TxLegacy) -> Result<TxEnvelope, SignerError> {
        let signature = self.wallet.sign_transaction_sync(&mut tx)?;
        Ok(TxEnvelope::Legacy(tx.into_signed(signature)))
    }
}
