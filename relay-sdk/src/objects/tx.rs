//! Signed transaction documents for the consensus chain.
//!
//! A transaction is signed over the canonical JSON of its [`StdSignDoc`]:
//! object keys sorted, no insignificant whitespace, integers as decimal
//! strings.

use serde::{Deserialize, Serialize};

use super::amino::string_u64;

/// Gas allowance attached to a transaction. The relay never pays fees in
/// coins, so `amount` stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    #[serde(with = "string_u64")]
    pub gas: u64,
}

impl StdFee {
    pub fn with_gas(gas: u64) -> Self {
        Self {
            amount: Vec::new(),
            gas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// The document a transaction signature commits to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdSignDoc {
    #[serde(with = "string_u64")]
    pub account_number: u64,
    pub chain_id: String,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<serde_json::Value>,
    #[serde(with = "string_u64")]
    pub sequence: u64,
}

impl StdSignDoc {
    /// Canonical bytes to sign.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let value = sort_keys(serde_json::to_value(self)?);
        serde_json::to_vec(&value)
    }
}

/// Rebuild every object with its keys in lexicographic order, including the
/// ones nested inside messages.
fn sort_keys(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(sort_keys).collect())
        }
        other => other,
    }
}

/// A signed transaction carrying a single message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdTx {
    pub msg: serde_json::Value,
    /// Unpadded base64 of the 65-byte recoverable signature.
    pub signature: String,
    pub memo: String,
}

/// Transaction wrapped in its registered type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Tx {
    #[serde(rename = "auth/StdTx")]
    Std(StdTx),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    Async,
    Sync,
    Block,
}

/// Body of `POST /txs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastTxRequest {
    pub tx: Tx,
    pub mode: BroadcastMode,
}

/// Reply of `POST /txs`. A non-zero `code` means the node refused the
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastTxResponse {
    #[serde(default)]
    pub height: Option<String>,
    pub txhash: String,
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub raw_log: Option<String>,
}

impl BroadcastTxResponse {
    pub fn is_rejected(&self) -> bool {
        self.code.is_some_and(|code| code != 0)
    }
}
