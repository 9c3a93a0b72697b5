//! Validated configuration the relay runs with.

use relay_sdk::topology::QueueBinding;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub amqp_url: String,
    pub heimdall: HeimdallSettings,
    pub bor: BorSettings,
    pub tasks: QueueBinding,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct HeimdallSettings {
    pub rest_url: Url,
    pub chain_id: String,
    pub gas: u64,
}

#[derive(Debug, Clone)]
pub struct BorSettings {
    pub rpc_url: Url,
    pub chain_id: Option<u64>,
}
