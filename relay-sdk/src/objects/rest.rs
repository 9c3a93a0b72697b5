//! Response envelopes returned by the consensus chain's REST server.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use super::amino::string_u64;

/// Every REST query result is wrapped with the height it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWithHeight<T> {
    #[serde(default)]
    pub height: String,
    pub result: T,
}

/// Account record as served by the account lookup endpoint.
///
/// Nodes either wrap the account in its registered type or return the bare
/// record; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountResponse {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        value: BaseAccount,
    },
    Plain(BaseAccount),
}

impl AccountResponse {
    pub fn into_account(self) -> BaseAccount {
        match self {
            AccountResponse::Typed { value, .. } => value,
            AccountResponse::Plain(account) => account,
        }
    }
}

/// The fields of an account the relay needs to sign transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    #[serde(with = "string_u64")]
    pub account_number: u64,
    #[serde(with = "string_u64")]
    pub sequence: u64,
}
