//! In-memory deliveries for exercising consumption loops.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;

use super::{Acknowledger, Envelope, EnvelopeStream, QueueError};

/// Ordered record of everything observable that happened during a test.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Acknowledger that writes `ack <id>` or `reject <id> requeue=<bool>`.
#[derive(Debug, Clone)]
pub struct RecordingAcker {
    id: usize,
    journal: Journal,
}

#[async_trait]
impl Acknowledger for RecordingAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.journal.push(format!("ack {}", self.id));
        Ok(())
    }

    async fn reject(&self, requeue: bool) -> Result<(), QueueError> {
        self.journal
            .push(format!("reject {} requeue={requeue}", self.id));
        Ok(())
    }
}

pub fn envelope(id: usize, body: impl Into<Bytes>, journal: &Journal) -> Envelope<RecordingAcker> {
    Envelope {
        exchange: "test".to_string(),
        routing_key: "test".to_string(),
        redelivered: false,
        body: body.into(),
        acker: RecordingAcker {
            id,
            journal: journal.clone(),
        },
    }
}

/// A finite stream over `bodies`, numbered from zero.
pub fn deliveries(bodies: Vec<Vec<u8>>, journal: &Journal) -> EnvelopeStream<RecordingAcker> {
    let envelopes: Vec<_> = bodies
        .into_iter()
        .enumerate()
        .map(|(id, body)| Ok(envelope(id, body, journal)))
        .collect();
    stream::iter(envelopes).boxed()
}
