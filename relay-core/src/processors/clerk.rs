//! State-sync events on the root chain become `MsgEventRecord`.

use alloy::sol;
use relay_sdk::objects::{HeimdallMsg, MsgEventRecord};

use super::event::{BridgeEvent, EventLog, EventProcessor, MessageContext};

sol! {
    /// Emitted by the state sender contract for every state pushed to the child chain.
    #[derive(Debug, PartialEq, Eq)]
    event StateSynced(uint256 indexed id, address indexed contractAddress, bytes data);
}

impl BridgeEvent for StateSynced {
    const TASK_NAME: &'static str = "sendStateSyncedToHeimdall";
    const STATUS_ENDPOINT: &'static str = "clerk/isoldtx";

    fn into_message(self, log: &EventLog, ctx: &MessageContext) -> Result<HeimdallMsg, String> {
        let id = u64::try_from(self.id)
            .map_err(|_| format!("state id {} does not fit in u64", self.id))?;
        Ok(HeimdallMsg::EventRecord(MsgEventRecord {
            from: ctx.from,
            tx_hash: log.tx_hash,
            log_index: log.log_index,
            id,
            contract_address: self.contractAddress,
            data: self.data,
            chain_id: ctx.bor_chain_id.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!(
            "id={} contract_address={} data_len={}",
            self.id,
            self.contractAddress,
            self.data.len()
        )
    }
}

pub type ClerkProcessor<G, B> = EventProcessor<StateSynced, G, B>;
