//! Validator fee top-ups on the root chain become `MsgTopup`.

use alloy::sol;
use relay_sdk::objects::{HeimdallMsg, MsgTopup};

use super::event::{BridgeEvent, EventLog, EventProcessor, MessageContext};

sol! {
    /// Emitted by the staking info contract when a validator tops up its fee.
    #[derive(Debug, PartialEq, Eq)]
    event TopUpFee(uint256 indexed validatorId, address indexed signer, uint256 indexed fee);
}

impl BridgeEvent for TopUpFee {
    const TASK_NAME: &'static str = "sendTopUpFeeToHeimdall";
    const STATUS_ENDPOINT: &'static str = "topup/isoldtx";

    fn into_message(self, log: &EventLog, ctx: &MessageContext) -> Result<HeimdallMsg, String> {
        let id = u64::try_from(self.validatorId)
            .map_err(|_| format!("validator id {} does not fit in u64", self.validatorId))?;
        Ok(HeimdallMsg::Topup(MsgTopup {
            from_address: ctx.from,
            id,
            fee: self.fee,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
        }))
    }

    fn describe(&self) -> String {
        format!(
            "validator_id={} signer={} fee={}",
            self.validatorId, self.signer, self.fee
        )
    }
}

pub type FeeProcessor<G, B> = EventProcessor<TopUpFee, G, B>;
