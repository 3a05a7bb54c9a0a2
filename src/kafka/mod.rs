// ============================================================================
// Kafka Module
// ============================================================================
//
// Stream-facing edge of the service: the consumer that drives inbound order
// messages to a terminal state, and the dead-letter publisher that parks the
// unprocessable ones.
//
// ============================================================================

pub mod consumer;
pub mod dlq;

pub use consumer::OrderConsumer;
pub use dlq::{DeadLetterSink, KafkaDeadLetter};
