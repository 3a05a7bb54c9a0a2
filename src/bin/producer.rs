use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use orders_service::generator;

/// Publishes synthetic orders to the inbound topic. Roughly one in ten is
/// deliberately broken so the dead-letter path gets exercised too.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let brokers = std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic = std::env::var("KAFKA_TOPIC").unwrap_or_else(|_| "orders".to_string());
    let count: u32 = std::env::var("ORDER_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10_000);

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("acks", "all")
        .set("message.timeout.ms", "5000")
        .create()?;

    tracing::info!(count, topic = %topic, "producer started");

    let mut sent = 0u32;
    for i in 0..count {
        let order_uid = Uuid::new_v4().simple().to_string();
        let order = if i % 10 == 9 {
            generator::broken_order(&order_uid)
        } else {
            generator::valid_order(&order_uid)
        };
        let payload = serde_json::to_vec(&order)?;

        let record = FutureRecord::to(&topic)
            .key(order_uid.as_bytes())
            .payload(&payload);
        if let Err((err, _)) = producer
            .send(record, rdkafka::util::Timeout::After(Duration::from_secs(5)))
            .await
        {
            tracing::error!(error = %err, order_uid = %order_uid, "failed to publish order");
            continue;
        }

        sent += 1;
        if sent % 500 == 0 {
            tracing::info!(sent, "progress");
        }
    }

    tracing::info!(sent, "producer finished");
    Ok(())
}
