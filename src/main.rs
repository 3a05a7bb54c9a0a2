use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use orders_service::cache::OrderCache;
use orders_service::config::Config;
use orders_service::kafka::{KafkaDeadLetter, OrderConsumer};
use orders_service::metrics::Metrics;
use orders_service::server;
use orders_service::service::OrderService;
use orders_service::store::PgOrderStore;
use orders_service::validator::RuleValidator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, overridable via RUST_LOG.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,orders_service=debug")),
        )
        .init();

    let cfg = Config::load()?;
    tracing::info!(
        topic = %cfg.kafka.topic,
        dlq_topic = %cfg.kafka.dlq_topic,
        cache_size = cfg.cache.size,
        "starting orders service"
    );

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db.pool_max_conns)
        .min_connections(cfg.db.pool_min_conns)
        .max_lifetime(cfg.db.pool_max_lifetime)
        .idle_timeout(cfg.db.pool_max_idle_time)
        .connect(&cfg.db.dsn())
        .await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    tracing::info!("connected to postgres");

    let metrics = Arc::new(Metrics::new()?);
    let cache = Arc::new(OrderCache::new(cfg.cache.size));
    let store = Arc::new(PgOrderStore::new(pool));
    let service = Arc::new(OrderService::new(
        store,
        cache,
        Arc::new(RuleValidator),
        metrics.clone(),
    ));

    if let Err(err) = service.warm_cache(cfg.cache.size as u64).await {
        tracing::warn!(error = %err, "cache warm-up failed, starting cold");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dlq = Arc::new(KafkaDeadLetter::new(&cfg.kafka.brokers, &cfg.kafka.dlq_topic)?);
    let consumer = OrderConsumer::new(&cfg.kafka, service.clone(), dlq, metrics.clone())?;
    let mut consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    let http = server::build_server(service, metrics, cfg.server.port)?;
    let http_handle = http.handle();
    let mut http_task = tokio::spawn(http);
    tracing::info!(port = cfg.server.port, "http server listening");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        result = &mut consumer_task => {
            tracing::error!("kafka consumer stopped unexpectedly");
            http_handle.stop(true).await;
            return result?;
        }
        result = &mut http_task => {
            tracing::error!("http server stopped unexpectedly");
            let _ = shutdown_tx.send(true);
            result??;
            return Ok(());
        }
    }

    // Graceful path: stop pulling messages, finish in-flight work, stop HTTP.
    let _ = shutdown_tx.send(true);
    if let Err(err) = consumer_task.await? {
        tracing::error!(error = %err, "kafka consumer shutdown error");
    }
    http_handle.stop(true).await;
    http_task.await??;
    tracing::info!("stopped gracefully");

    Ok(())
}
