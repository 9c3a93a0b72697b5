use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// A call to execute on the child chain.
///
/// Nonce and gas are not part of the description; the relay resolves them
/// from the child chain when it sends the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildChainCall {
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_and_data_default_to_empty() {
        let call: ChildChainCall =
            serde_json::from_str(r#"{"to":"0x0000000000000000000000000000000000001001"}"#)
                .unwrap();
        assert_eq!(call.value, U256::ZERO);
        assert!(call.data.is_empty());
    }

    #[test]
    fn test_missing_recipient_is_rejected() {
        assert!(serde_json::from_str::<ChildChainCall>(r#"{"value":"0x1"}"#).is_err());
    }
}
