use std::marker::PhantomData;

use alloy::primitives::{Address, B256, LogData};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use relay_sdk::objects::{EventTask, HeimdallMsg};
use tracing::{error, info, warn};

use super::{TaskFailure, TaskHandler, TaskOutcome, TxBroadcaster};
use crate::gate::IdempotencyGate;

/// Relayer facts every message needs besides the event itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    /// The relayer's address, used as the message sender.
    pub from: Address,
    /// Chain id of the child chain, carried by state-sync records.
    pub bor_chain_id: String,
}

/// A chain log identified by `(tx_hash, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub tx_hash: B256,
    pub log_index: u64,
    pub event_name: String,
    pub data: LogData,
}

impl EventLog {
    /// Parse the JSON text of an RPC log. A pending log without a transaction
    /// hash or log index cannot be deduplicated and is malformed.
    pub fn parse(event_name: &str, raw: &str) -> Result<Self, TaskFailure> {
        let log: alloy::rpc::types::Log = serde_json::from_str(raw)
            .map_err(|e| TaskFailure::Malformed(format!("invalid log json: {e}")))?;
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| TaskFailure::Malformed("log has no transaction hash".to_string()))?;
        let log_index = log
            .log_index
            .ok_or_else(|| TaskFailure::Malformed("log has no log index".to_string()))?;
        Ok(Self {
            address: log.inner.address,
            tx_hash,
            log_index,
            event_name: event_name.to_owned(),
            data: log.inner.data,
        })
    }
}

/// A contract event the relay forwards to the consensus chain.
pub trait BridgeEvent: SolEvent + Send + Sync + 'static {
    /// Name the processor registers under.
    const TASK_NAME: &'static str;

    /// Status endpoint answering whether the event was already recorded.
    const STATUS_ENDPOINT: &'static str;

    fn into_message(self, log: &EventLog, ctx: &MessageContext) -> Result<HeimdallMsg, String>;

    /// Identifying fields for logs.
    fn describe(&self) -> String;

    /// The event name, i.e. the signature up to its parameter list.
    fn event_name() -> &'static str {
        Self::SIGNATURE
            .split('(')
            .next()
            .unwrap_or(Self::SIGNATURE)
    }
}

/// Decode, deduplicate, build, and dispatch for one event type.
pub struct EventProcessor<E, G, B> {
    gate: G,
    broadcaster: B,
    context: MessageContext,
    _event: PhantomData<fn() -> E>,
}

impl<E, G, B> EventProcessor<E, G, B>
where
    E: BridgeEvent,
    G: IdempotencyGate,
    B: TxBroadcaster,
{
    pub fn new(gate: G, broadcaster: B, context: MessageContext) -> Self {
        Self {
            gate,
            broadcaster,
            context,
            _event: PhantomData,
        }
    }

    pub async fn process(&self, task: &EventTask) -> TaskOutcome {
        match self.try_process(task).await {
            Ok(outcome) => outcome,
            Err(failure) => TaskOutcome::Failed(failure),
        }
    }

    async fn try_process(&self, task: &EventTask) -> Result<TaskOutcome, TaskFailure> {
        let log = EventLog::parse(&task.event_name, &task.log).inspect_err(|e| {
            error!(task = E::TASK_NAME, event = %task.event_name, error = %e, "Error while parsing log");
        })?;
        let event = self.unpack(&log)?;
        let details = event.describe();

        let processed = self
            .gate
            .is_already_processed(E::STATUS_ENDPOINT, log.tx_hash, log.log_index)
            .await
            .map_err(|e| {
                warn!(
                    event = E::event_name(),
                    details = %details,
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    error = %e,
                    "Idempotency gate unavailable, not dispatching"
                );
                TaskFailure::GateUnavailable(e)
            })?;
        if processed {
            info!(
                event = E::event_name(),
                details = %details,
                tx_hash = %log.tx_hash,
                log_index = log.log_index,
                "Ignoring task, event already processed"
            );
            return Ok(TaskOutcome::AlreadyProcessed);
        }

        let msg = event
            .into_message(&log, &self.context)
            .map_err(|reason| {
                error!(
                    event = E::event_name(),
                    details = %details,
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    reason = %reason,
                    "Event does not fit its message"
                );
                TaskFailure::Unpack {
                    event: E::event_name().to_owned(),
                    reason,
                }
            })?;

        info!(
            event = E::event_name(),
            details = %details,
            tx_hash = %log.tx_hash,
            log_index = log.log_index,
            msg_type = msg.type_name(),
            "Sending message to heimdall"
        );
        self.broadcaster
            .broadcast_to_heimdall(&msg)
            .await
            .map_err(|e| {
                error!(
                    event = E::event_name(),
                    details = %details,
                    tx_hash = %log.tx_hash,
                    log_index = log.log_index,
                    error = %e,
                    "Error while broadcasting message to heimdall"
                );
                TaskFailure::Dispatch(e)
            })?;
        Ok(TaskOutcome::Dispatched)
    }

    fn unpack(&self, log: &EventLog) -> Result<E, TaskFailure> {
        let fail = |reason: String| {
            error!(
                event = %log.event_name,
                tx_hash = %log.tx_hash,
                log_index = log.log_index,
                reason = %reason,
                "Error while unpacking log"
            );
            TaskFailure::Unpack {
                event: log.event_name.clone(),
                reason,
            }
        };

        if log.event_name != E::event_name() {
            return Err(fail(format!(
                "task carries {}, processor handles {}",
                log.event_name,
                E::event_name()
            )));
        }
        if log.data.topics().first() != Some(&E::SIGNATURE_HASH) {
            return Err(fail("first topic is not the event selector".to_string()));
        }
        E::decode_log_data(&log.data, true).map_err(|e| fail(e.to_string()))
    }
}

#[async_trait]
impl<E, G, B> TaskHandler for EventProcessor<E, G, B>
where
    E: BridgeEvent,
    G: IdempotencyGate,
    B: TxBroadcaster,
{
    fn task_name(&self) -> &'static str {
        E::TASK_NAME
    }

    async fn handle(&self, task: &EventTask) -> TaskOutcome {
        self.process(task).await
    }
}
