//! Domain messages recorded on the consensus chain.
//!
//! Every message travels as `{"type": "...", "value": {...}}`, the shape the
//! consensus chain's JSON codec registers concrete message types under.

use alloy::primitives::{Address, B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use super::amino::{decimal_u256, string_u64};

/// A message for the consensus chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum HeimdallMsg {
    #[serde(rename = "topup/MsgTopup")]
    Topup(MsgTopup),
    #[serde(rename = "clerk/MsgEventRecord")]
    EventRecord(MsgEventRecord),
}

impl HeimdallMsg {
    /// The registered type name of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            HeimdallMsg::Topup(_) => "topup/MsgTopup",
            HeimdallMsg::EventRecord(_) => "clerk/MsgEventRecord",
        }
    }

    /// The root-chain transaction hash and log index this message is evidenced by.
    pub fn evidence(&self) -> (B256, u64) {
        match self {
            HeimdallMsg::Topup(msg) => (msg.tx_hash, msg.log_index),
            HeimdallMsg::EventRecord(msg) => (msg.tx_hash, msg.log_index),
        }
    }
}

/// Records a validator fee top-up observed on the root chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTopup {
    pub from_address: Address,
    /// Validator id.
    #[serde(with = "string_u64")]
    pub id: u64,
    #[serde(with = "decimal_u256")]
    pub fee: U256,
    pub tx_hash: B256,
    #[serde(with = "string_u64")]
    pub log_index: u64,
}

/// Records a state-sync event destined for the child chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEventRecord {
    pub from: Address,
    pub tx_hash: B256,
    #[serde(with = "string_u64")]
    pub log_index: u64,
    #[serde(with = "string_u64")]
    pub id: u64,
    pub contract_address: Address,
    pub data: Bytes,
    pub chain_id: String,
}
