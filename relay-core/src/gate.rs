//! Idempotency gate: asks the consensus chain whether a root-chain event has
//! already been recorded before a message for it is dispatched.

use std::sync::Arc;

use alloy::primitives::B256;
use async_trait::async_trait;
use kanau::processor::Processor;
use relay_sdk::client::{ClientError, HeimdallClient};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("tx status query failed: {0}")]
    Client(#[from] ClientError),
}

/// Decides whether the event at `(tx_hash, log_index)` was already processed.
#[async_trait]
pub trait IdempotencyGate: Send + Sync {
    async fn is_already_processed(
        &self,
        endpoint: &'static str,
        tx_hash: B256,
        log_index: u64,
    ) -> Result<bool, GateError>;
}

#[async_trait]
impl<T: IdempotencyGate + ?Sized> IdempotencyGate for Arc<T> {
    async fn is_already_processed(
        &self,
        endpoint: &'static str,
        tx_hash: B256,
        log_index: u64,
    ) -> Result<bool, GateError> {
        (**self)
            .is_already_processed(endpoint, tx_hash, log_index)
            .await
    }
}

/// A status lookup against one of the chain's `isoldtx` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxStatusQuery {
    pub endpoint: &'static str,
    pub tx_hash: B256,
    pub log_index: u64,
}

/// Gate backed by the consensus chain's REST server.
#[derive(Debug, Clone)]
pub struct RestIdempotencyGate {
    client: HeimdallClient,
}

impl RestIdempotencyGate {
    pub fn new(client: HeimdallClient) -> Self {
        Self { client }
    }
}

impl Processor<TxStatusQuery> for RestIdempotencyGate {
    type Output = bool;
    type Error = GateError;

    async fn process(&self, query: TxStatusQuery) -> Result<bool, GateError> {
        let tx_hash = format!("{:#x}", query.tx_hash);
        match self
            .client
            .tx_status(query.endpoint, &tx_hash, query.log_index)
            .await
        {
            Ok(processed) => {
                debug!(
                    endpoint = query.endpoint,
                    tx_hash = %tx_hash,
                    log_index = query.log_index,
                    processed,
                    "Fetched tx status"
                );
                Ok(processed)
            }
            Err(e) => {
                error!(
                    endpoint = query.endpoint,
                    tx_hash = %tx_hash,
                    log_index = query.log_index,
                    error = %e,
                    "Error fetching tx status"
                );
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl IdempotencyGate for RestIdempotencyGate {
    async fn is_already_processed(
        &self,
        endpoint: &'static str,
        tx_hash: B256,
        log_index: u64,
    ) -> Result<bool, GateError> {
        self.process(TxStatusQuery {
            endpoint,
            tx_hash,
            log_index,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TX_HASH: B256 =
        b256!("00000000000000000000000000000000000000000000000000000000000000ab");

    fn gate(server: &MockServer) -> RestIdempotencyGate {
        RestIdempotencyGate::new(HeimdallClient::new(Url::parse(&server.uri()).unwrap()))
    }

    async fn mount_status(server: &MockServer, processed: bool) {
        Mock::given(method("GET"))
            .and(path("/topup/isoldtx"))
            .and(query_param(
                "txhash",
                "0x00000000000000000000000000000000000000000000000000000000000000ab",
            ))
            .and(query_param("logindex", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"height": "1", "result": processed})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_unprocessed_event() {
        let server = MockServer::start().await;
        mount_status(&server, false).await;
        let processed = gate(&server)
            .is_already_processed("topup/isoldtx", TX_HASH, 2)
            .await
            .unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn test_processed_event() {
        let server = MockServer::start().await;
        mount_status(&server, true).await;
        let processed = gate(&server)
            .is_already_processed("topup/isoldtx", TX_HASH, 2)
            .await
            .unwrap();
        assert!(processed);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let result = gate(&server)
            .is_already_processed("topup/isoldtx", TX_HASH, 2)
            .await;
        assert!(matches!(result, Err(GateError::Client(_))));
    }
}
