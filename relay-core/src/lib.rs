//! Event relay pipeline of the bridge.
//!
//! Chain events arrive as tasks on the broker, are deduplicated against the
//! consensus chain, and leave as signed transactions: consensus-chain
//! messages through the heimdall queue, child-chain calls through the bor
//! queue.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

pub mod broadcaster;
pub mod consumers;
pub mod dispatcher;
pub mod gate;
pub mod processors;
pub mod queue;
pub mod signer;
