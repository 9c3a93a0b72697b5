//! Shared wire types for the bridge relay.
//!
//! Producers (log watchers, other bridge services) depend on this crate to
//! publish onto the relay's queues with the exact names and payload shapes the
//! relay consumes.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![forbid(unsafe_code)]

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
pub mod topology;
