use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::watch;

use super::dlq::DeadLetterSink;
use crate::config::KafkaConfig;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::service::OrderService;
use crate::utils::{retry_on_transient, RetryConfig, RetryOutcome};

// ============================================================================
// Order Ingestion Pipeline
// ============================================================================
//
// Pulls order messages from the inbound topic and drives each one to a
// terminal state before the next begins:
//
//   Received -> decode -> identifier check -> validate -> write-through
//
// Malformed messages (undecodable, no identifier, invalid) quarantine
// immediately: a retry cannot fix them. Transient store failures retry the
// write-through step only, with a fixed delay, up to the configured limit;
// exhaustion quarantines. An offset is committed only once its message is
// Committed or Quarantined, which makes delivery at-least-once: after a
// crash the store's idempotent write absorbs the redelivered duplicates.
// A shutdown observed mid-retry aborts without committing, so the message
// is redelivered on the next start.
//
// ============================================================================

/// Terminal state of one message.
#[derive(Debug, PartialEq)]
pub(crate) enum MessageOutcome {
    /// Durably applied; the offset may be acknowledged.
    Committed,
    /// Parked on the dead-letter topic; the offset may be acknowledged.
    Quarantined,
    /// Shutdown interrupted processing; the offset must not be acknowledged.
    Cancelled,
}

/// Per-message state machine, split from the poll loop so the terminal
/// states are testable without a broker.
pub(crate) struct MessageProcessor {
    service: Arc<OrderService>,
    dlq: Arc<dyn DeadLetterSink>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl MessageProcessor {
    pub(crate) fn new(
        service: Arc<OrderService>,
        dlq: Arc<dyn DeadLetterSink>,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            service,
            dlq,
            retry,
            metrics,
        }
    }

    pub(crate) async fn process(
        &self,
        key: &[u8],
        payload: &[u8],
        shutdown: &mut watch::Receiver<bool>,
    ) -> MessageOutcome {
        let order = match serde_json::from_slice::<Order>(payload) {
            Ok(order) => order,
            Err(err) => {
                tracing::warn!(error = %err, "undecodable payload");
                self.quarantine("decode", key, payload).await;
                return MessageOutcome::Quarantined;
            }
        };

        if order.order_uid.is_empty() {
            tracing::warn!("order without order_uid");
            self.quarantine("missing_uid", key, payload).await;
            return MessageOutcome::Quarantined;
        }

        if let Err(err) = self.service.validate(&order) {
            tracing::warn!(
                order_uid = %order.order_uid,
                error = %err,
                "order failed validation"
            );
            self.quarantine("validation", key, payload).await;
            return MessageOutcome::Quarantined;
        }

        // Decode and validation are settled; only the durable write is
        // retried from here on.
        let outcome = retry_on_transient(&self.retry, shutdown, |attempt| {
            if attempt > 1 {
                self.metrics.retry_attempts_total.inc();
            }
            let service = &self.service;
            let order = &order;
            async move { service.write_through(order).await }
        })
        .await;

        match outcome {
            RetryOutcome::Success(()) => {
                self.metrics.messages_committed.inc();
                tracing::info!(order_uid = %order.order_uid, "order committed");
                MessageOutcome::Committed
            }
            RetryOutcome::Permanent(err) => {
                tracing::error!(
                    order_uid = %order.order_uid,
                    error = %err,
                    "permanent store failure"
                );
                self.quarantine("store_failure", key, payload).await;
                MessageOutcome::Quarantined
            }
            RetryOutcome::Exhausted(err) => {
                tracing::error!(
                    order_uid = %order.order_uid,
                    error = %err,
                    "write-through attempts exhausted"
                );
                self.quarantine("retry_exhausted", key, payload).await;
                MessageOutcome::Quarantined
            }
            RetryOutcome::Cancelled => MessageOutcome::Cancelled,
        }
    }

    /// Best effort: a failed dead-letter publish is logged and counted, never
    /// retried, so a broken side channel cannot stall the partition.
    async fn quarantine(&self, reason: &'static str, key: &[u8], payload: &[u8]) {
        self.metrics.record_quarantine(reason);
        if let Err(err) = self.dlq.publish(key, payload).await {
            self.metrics.dlq_publish_failures.inc();
            tracing::error!(error = %err, reason, "dead-letter publish failed");
        }
    }
}

pub struct OrderConsumer {
    consumer: StreamConsumer,
    processor: MessageProcessor,
}

impl OrderConsumer {
    pub fn new(
        cfg: &KafkaConfig,
        service: Arc<OrderService>,
        dlq: Arc<dyn DeadLetterSink>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.brokers)
            .set("group.id", &cfg.group)
            .set("enable.auto.commit", "false")
            // Replay from the start on a fresh group: the idempotent store
            // write absorbs duplicates, and nothing gets skipped.
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(&[&cfg.topic])?;

        Ok(Self {
            consumer,
            processor: MessageProcessor::new(service, dlq, cfg.retry.clone(), metrics),
        })
    }

    /// Sequential poll loop for the assigned partitions. Runs until the
    /// shutdown signal flips; an in-flight message either finishes or aborts
    /// uncommitted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        tracing::info!("kafka consumer started");
        let mut stream = self.consumer.stream();

        loop {
            let polled = tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("kafka consumer: shutdown signal");
                    return Ok(());
                }
                polled = stream.next() => polled,
            };

            let message = match polled {
                Some(Ok(message)) => message,
                Some(Err(err)) => {
                    tracing::error!(error = %err, "kafka poll error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
                None => continue,
            };

            tracing::debug!(
                topic = message.topic(),
                partition = message.partition(),
                offset = message.offset(),
                "processing message"
            );

            let key = message.key().unwrap_or_default();
            let payload = message.payload().unwrap_or_default();

            match self.processor.process(key, payload, &mut shutdown).await {
                MessageOutcome::Committed | MessageOutcome::Quarantined => {
                    if let Err(err) = self.consumer.commit_message(&message, CommitMode::Async) {
                        tracing::error!(error = %err, "offset commit failed");
                    }
                }
                MessageOutcome::Cancelled => {
                    tracing::info!("kafka consumer: aborted mid-message, offset not committed");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::OrderCache;
    use crate::generator::valid_order;
    use crate::store::memory::InMemoryStore;
    use crate::validator::RuleValidator;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDlq {
        published: Mutex<Vec<(Vec<u8>, Vec<u8>)>>,
        fail: AtomicBool,
    }

    impl RecordingDlq {
        fn published(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl DeadLetterSink for RecordingDlq {
        async fn publish(&self, key: &[u8], payload: &[u8]) -> anyhow::Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("dead-letter topic unavailable");
            }
            self.published
                .lock()
                .unwrap()
                .push((key.to_vec(), payload.to_vec()));
            Ok(())
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        dlq: Arc<RecordingDlq>,
        processor: MessageProcessor,
        shutdown_tx: watch::Sender<bool>,
        shutdown_rx: watch::Receiver<bool>,
    }

    fn harness(max_attempts: u32) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let dlq = Arc::new(RecordingDlq::default());
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = Arc::new(OrderService::new(
            store.clone(),
            Arc::new(OrderCache::new(16)),
            Arc::new(RuleValidator),
            metrics.clone(),
        ));
        let processor = MessageProcessor::new(
            service,
            dlq.clone(),
            RetryConfig {
                max_attempts,
                delay: Duration::from_millis(10),
            },
            metrics,
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Harness {
            store,
            dlq,
            processor,
            shutdown_tx,
            shutdown_rx,
        }
    }

    fn payload_for(uid: &str) -> Vec<u8> {
        serde_json::to_vec(&valid_order(uid)).unwrap()
    }

    #[tokio::test]
    async fn malformed_payload_quarantines_without_touching_the_store() {
        let mut h = harness(5);
        let payload = b"{definitely not an order".to_vec();

        let outcome = h
            .processor
            .process(b"k1", &payload, &mut h.shutdown_rx)
            .await;

        assert_eq!(outcome, MessageOutcome::Quarantined);
        assert_eq!(h.store.create_calls(), 0);
        assert_eq!(h.dlq.published(), vec![(b"k1".to_vec(), payload)]);
    }

    #[tokio::test]
    async fn missing_identifier_quarantines() {
        let mut h = harness(5);
        let payload = payload_for("");

        let outcome = h.processor.process(b"k", &payload, &mut h.shutdown_rx).await;

        assert_eq!(outcome, MessageOutcome::Quarantined);
        assert_eq!(h.store.create_calls(), 0);
        assert_eq!(h.dlq.published().len(), 1);
    }

    #[tokio::test]
    async fn invalid_order_quarantines_without_retry() {
        let mut h = harness(5);
        let mut order = valid_order("invalid-1");
        order.items.clear();
        let payload = serde_json::to_vec(&order).unwrap();

        let outcome = h.processor.process(b"k", &payload, &mut h.shutdown_rx).await;

        assert_eq!(outcome, MessageOutcome::Quarantined);
        assert_eq!(h.store.create_calls(), 0);
    }

    #[tokio::test]
    async fn transient_failures_retry_until_the_write_lands() {
        let mut h = harness(5);
        h.store.fail_next_writes(2);
        let payload = payload_for("retry-ok");

        let outcome = h.processor.process(b"k", &payload, &mut h.shutdown_rx).await;

        assert_eq!(outcome, MessageOutcome::Committed);
        assert_eq!(h.store.create_calls(), 3);
        assert_eq!(h.store.stored_uids(), vec!["retry-ok"]);
        assert!(h.dlq.published().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_quarantine_the_original_payload() {
        let mut h = harness(3);
        h.store.fail_all_writes();
        let payload = payload_for("never-lands");

        let outcome = h
            .processor
            .process(b"orig-key", &payload, &mut h.shutdown_rx)
            .await;

        assert_eq!(outcome, MessageOutcome::Quarantined);
        assert_eq!(h.store.create_calls(), 3);
        assert!(h.store.stored_uids().is_empty());
        // The dead-letter record carries the untouched key and payload.
        assert_eq!(h.dlq.published(), vec![(b"orig-key".to_vec(), payload)]);
    }

    #[tokio::test]
    async fn shutdown_mid_retry_aborts_without_quarantining() {
        let mut h = harness(5);
        h.store.fail_all_writes();
        h.processor.retry.delay = Duration::from_secs(60);
        let payload = payload_for("cancelled");
        let tx = h.shutdown_tx;

        let handle = tokio::spawn(async move {
            h.processor.process(b"k", &payload, &mut h.shutdown_rx).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        assert_eq!(handle.await.unwrap(), MessageOutcome::Cancelled);
    }

    #[tokio::test]
    async fn one_bad_message_does_not_block_its_neighbors() {
        let mut h = harness(5);
        let mut committed = 0;
        let mut quarantined = 0;

        for i in 0..10 {
            let payload = if i == 3 {
                b"broken{".to_vec()
            } else {
                payload_for(&format!("batch-{i}"))
            };
            match h.processor.process(b"k", &payload, &mut h.shutdown_rx).await {
                MessageOutcome::Committed => committed += 1,
                MessageOutcome::Quarantined => quarantined += 1,
                MessageOutcome::Cancelled => panic!("unexpected cancellation"),
            }
        }

        assert_eq!(committed, 9);
        assert_eq!(quarantined, 1);
        assert_eq!(h.store.stored_uids().len(), 9);
        assert_eq!(h.dlq.published().len(), 1);
    }

    #[tokio::test]
    async fn dead_letter_failure_is_swallowed() {
        let mut h = harness(5);
        h.dlq.fail.store(true, Ordering::SeqCst);

        let outcome = h
            .processor
            .process(b"k", b"not json", &mut h.shutdown_rx)
            .await;

        // Still quarantined from the pipeline's point of view; progress is
        // never blocked by the side channel.
        assert_eq!(outcome, MessageOutcome::Quarantined);
        assert!(h.dlq.published().is_empty());
    }
}
