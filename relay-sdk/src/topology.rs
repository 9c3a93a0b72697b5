//! Broker topology names.
//!
//! These names are part of the wire contract with every service that
//! publishes to the relay. Changing any of them strands messages on the
//! broker.

/// Topic exchange all broadcast traffic is published to.
pub const BROADCAST_EXCHANGE: &str = "bridge.exchange.broadcast";

/// Queue drained by the consensus-chain (heimdall) consumer.
pub const HEIMDALL_QUEUE: &str = "bridge.queue.heimdall";

/// Queue drained by the child-chain (bor) consumer.
pub const BOR_QUEUE: &str = "bridge.queue.bor";

/// Routing key bound to [`HEIMDALL_QUEUE`].
pub const HEIMDALL_ROUTE: &str = "bridge.route.heimdall";

/// Routing key bound to [`BOR_QUEUE`].
pub const BOR_ROUTE: &str = "bridge.route.bor";

/// Default exchange for event tasks.
pub const DEFAULT_TASK_EXCHANGE: &str = "bridge.exchange.tasks";

/// Default queue for event tasks.
pub const DEFAULT_TASK_QUEUE: &str = "bridge.queue.tasks";

/// Default routing key for event tasks.
pub const DEFAULT_TASK_ROUTE: &str = "bridge.route.tasks";

/// Content type set on every published message.
pub const CONTENT_TYPE: &str = "text/plain";

/// Names of an exchange, a queue, and the routing key that binds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueBinding {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

impl QueueBinding {
    pub fn new(
        exchange: impl Into<String>,
        queue: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            queue: queue.into(),
            routing_key: routing_key.into(),
        }
    }

    /// The consensus-chain broadcast binding.
    pub fn heimdall() -> Self {
        Self::new(BROADCAST_EXCHANGE, HEIMDALL_QUEUE, HEIMDALL_ROUTE)
    }

    /// The child-chain broadcast binding.
    pub fn bor() -> Self {
        Self::new(BROADCAST_EXCHANGE, BOR_QUEUE, BOR_ROUTE)
    }

    /// The default event-task binding.
    pub fn tasks() -> Self {
        Self::new(DEFAULT_TASK_EXCHANGE, DEFAULT_TASK_QUEUE, DEFAULT_TASK_ROUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_bindings_share_exchange() {
        let heimdall = QueueBinding::heimdall();
        let bor = QueueBinding::bor();
        assert_eq!(heimdall.exchange, "bridge.exchange.broadcast");
        assert_eq!(heimdall.exchange, bor.exchange);
        assert_eq!(heimdall.queue, "bridge.queue.heimdall");
        assert_eq!(heimdall.routing_key, "bridge.route.heimdall");
        assert_eq!(bor.queue, "bridge.queue.bor");
        assert_eq!(bor.routing_key, "bridge.route.bor");
    }
}
