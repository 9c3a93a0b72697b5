use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicRejectOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use relay_sdk::objects::{ChildChainCall, EventTask, HeimdallMsg};
use relay_sdk::topology::{
    BOR_QUEUE, BOR_ROUTE, BROADCAST_EXCHANGE, CONTENT_TYPE, HEIMDALL_QUEUE, HEIMDALL_ROUTE,
    QueueBinding,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{Acknowledger, Envelope, EnvelopeStream, QueueError};
use crate::broadcaster::ConsensusChainClient;
use crate::consumers::{BorConsumer, ConsumerHandles, HeimdallConsumer, TaskConsumer, spawn_consumer};
use crate::dispatcher::ChildChainClient;
use crate::processors::TxBroadcaster;

const CLOSE_REPLY_CODE: u16 = 200;

/// Acknowledges a delivery on the channel it arrived on.
pub struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.0.ack(BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), QueueError> {
        self.0.reject(BasicRejectOptions { requeue }).await?;
        Ok(())
    }
}

impl From<Delivery> for Envelope<AmqpAcker> {
    fn from(delivery: Delivery) -> Self {
        Envelope {
            exchange: delivery.exchange.as_str().to_owned(),
            routing_key: delivery.routing_key.as_str().to_owned(),
            redelivered: delivery.redelivered,
            body: Bytes::from(delivery.data),
            acker: AmqpAcker(delivery.acker),
        }
    }
}

/// One broker connection and channel shared by every publisher and consumer
/// of the relay.
pub struct QueueConnector {
    connection: Connection,
    channel: Channel,
    tasks: QueueBinding,
    closed: AtomicBool,
}

impl QueueConnector {
    /// Dial the broker and open a channel. Nothing is declared until
    /// [`declare_topology`](Self::declare_topology) or [`start`](Self::start).
    pub async fn connect(url: &str, tasks: QueueBinding) -> Result<Self, QueueError> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        info!(channel_id = channel.id(), "Connected to message broker");
        Ok(Self {
            connection,
            channel,
            tasks,
            closed: AtomicBool::new(false),
        })
    }

    pub fn task_binding(&self) -> &QueueBinding {
        &self.tasks
    }

    /// Declare the broadcast exchange, both broadcast queues, and the task
    /// binding. Every declaration is durable and idempotent.
    pub async fn declare_topology(&self) -> Result<(), QueueError> {
        for binding in topology(&self.tasks) {
            self.declare_binding(&binding).await?;
        }
        Ok(())
    }

    async fn declare_binding(&self, binding: &QueueBinding) -> Result<(), QueueError> {
        self.channel
            .exchange_declare(
                &binding.exchange,
                ExchangeKind::Topic,
                exchange_options(),
                FieldTable::default(),
            )
            .await?;
        self.channel
            .queue_declare(&binding.queue, queue_options(), FieldTable::default())
            .await?;
        self.channel
            .queue_bind(
                &binding.queue,
                &binding.exchange,
                &binding.routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        debug!(
            exchange = %binding.exchange,
            queue = %binding.queue,
            routing_key = %binding.routing_key,
            "Declared queue binding"
        );
        Ok(())
    }

    /// Consume `queue` with manual acknowledgement. The consumer tag is the
    /// queue name.
    pub async fn consume(&self, queue: &str) -> Result<EnvelopeStream<AmqpAcker>, QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        let consumer = self
            .channel
            .basic_consume(
                queue,
                queue,
                consume_options(),
                FieldTable::default(),
            )
            .await?;
        Ok(consumer
            .map(|delivery| {
                delivery
                    .map(Envelope::from)
                    .map_err(QueueError::from)
            })
            .boxed())
    }

    /// Declare the topology and spawn the three consumption loops.
    pub async fn start<H, B>(
        &self,
        heimdall: HeimdallConsumer<H>,
        bor: BorConsumer<B>,
        tasks: TaskConsumer,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<ConsumerHandles, QueueError>
    where
        H: ConsensusChainClient + 'static,
        B: ChildChainClient + 'static,
    {
        self.declare_topology().await?;

        let heimdall_deliveries = self.consume(HEIMDALL_QUEUE).await?;
        let bor_deliveries = self.consume(BOR_QUEUE).await?;
        let task_deliveries = self.consume(&self.tasks.queue).await?;

        let heimdall = spawn_consumer(
            "heimdall",
            heimdall.run(heimdall_deliveries, shutdown_rx.clone()),
        );
        let bor = spawn_consumer("bor", bor.run(bor_deliveries, shutdown_rx.clone()));
        let tasks = spawn_consumer("tasks", tasks.run(task_deliveries, shutdown_rx));

        info!("Queue consumers started");
        Ok(ConsumerHandles::new(heimdall, bor, tasks))
    }

    /// Publish `payload` to the broadcast exchange under `routing_key`.
    pub async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), QueueError> {
        self.publish_to(BROADCAST_EXCHANGE, routing_key, payload)
            .await
    }

    async fn publish_to(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        self.channel
            .basic_publish(
                exchange,
                routing_key,
                publish_options(),
                payload,
                BasicProperties::default().with_content_type(CONTENT_TYPE.into()),
            )
            .await?
            .await?;
        debug!(exchange, routing_key, bytes = payload.len(), "Published message");
        Ok(())
    }

    /// Serialize a consensus-chain message and enqueue it for the heimdall
    /// consumer.
    pub async fn broadcast_to_heimdall(&self, msg: &HeimdallMsg) -> Result<(), QueueError> {
        let data = serde_json::to_vec(msg)?;
        self.broadcast_bytes_to_heimdall(&data).await
    }

    /// Enqueue an already-encoded consensus-chain message.
    pub async fn broadcast_bytes_to_heimdall(&self, data: &[u8]) -> Result<(), QueueError> {
        self.publish(HEIMDALL_ROUTE, data).await
    }

    /// Enqueue a child-chain call for the bor consumer.
    pub async fn broadcast_to_bor(&self, call: &ChildChainCall) -> Result<(), QueueError> {
        let data = serde_json::to_vec(call)?;
        self.publish(BOR_ROUTE, &data).await
    }

    /// Enqueue an event task on the configured task binding.
    pub async fn publish_task(&self, task: &EventTask) -> Result<(), QueueError> {
        let data = serde_json::to_vec(task)?;
        self.publish_to(&self.tasks.exchange, &self.tasks.routing_key, &data)
            .await
    }

    /// Close the channel, then the connection. Calling it again is a no-op.
    pub async fn stop(&self) -> Result<(), QueueError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let channel = self.channel.close(CLOSE_REPLY_CODE, "relay shutdown").await;
        if let Err(e) = &channel {
            warn!(error = %e, "Failed to close broker channel");
        }
        self.connection
            .close(CLOSE_REPLY_CODE, "relay shutdown")
            .await?;
        info!("Disconnected from message broker");
        channel.map_err(QueueError::from)
    }
}

/// Every binding the relay declares: both broadcast queues, then `tasks`.
fn topology(tasks: &QueueBinding) -> [QueueBinding; 3] {
    [QueueBinding::heimdall(), QueueBinding::bor(), tasks.clone()]
}

/// Durable, kept when unused.
fn exchange_options() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

/// Durable, shared, kept when unused.
fn queue_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..Default::default()
    }
}

/// Manual acknowledgement, not exclusive.
fn consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions::default()
}

/// Neither mandatory nor immediate.
fn publish_options() -> BasicPublishOptions {
    BasicPublishOptions::default()
}

#[async_trait]
impl TxBroadcaster for QueueConnector {
    async fn broadcast_to_heimdall(&self, msg: &HeimdallMsg) -> Result<(), QueueError> {
        QueueConnector::broadcast_to_heimdall(self, msg).await
    }
}
