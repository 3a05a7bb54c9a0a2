use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

// ============================================================================
// Dead-Letter Publisher
// ============================================================================
//
// Parks permanently unprocessable messages on a separate topic for manual
// inspection. The original key and payload are republished unchanged so the
// quarantined record can be replayed later. Publishing is best effort: a
// failure here is the caller's to log, never to retry.
//
// ============================================================================

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(&self, key: &[u8], payload: &[u8]) -> Result<()>;
}

pub struct KafkaDeadLetter {
    producer: FutureProducer,
    topic: String,
}

impl KafkaDeadLetter {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetter {
    async fn publish(&self, key: &[u8], payload: &[u8]) -> Result<()> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        self.producer
            .send(record, rdkafka::util::Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("kafka send error: {}", e))?;

        tracing::info!(topic = %self.topic, "message parked on dead-letter topic");
        Ok(())
    }
}
