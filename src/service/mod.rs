use std::sync::Arc;

use crate::cache::OrderCache;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::store::{OrderStore, StoreError};
use crate::utils::IsTransient;
use crate::validator::{OrderValidator, ValidationError};

// ============================================================================
// Order Service
// ============================================================================
//
// Composition layer between the edges (HTTP, Kafka) and the cache/store pair:
// cache-then-store on reads, store-then-cache on writes. The cache is updated
// only after the durable write commits, so a crash between the two leaves
// nothing stale: the next read repopulates from the store.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("order not found")]
    NotFound,

    #[error("invalid order: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            other => ServiceError::Store(other),
        }
    }
}

impl IsTransient for ServiceError {
    fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Store(e) if e.is_transient())
    }
}

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    cache: Arc<OrderCache>,
    validator: Arc<dyn OrderValidator>,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        cache: Arc<OrderCache>,
        validator: Arc<dyn OrderValidator>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            cache,
            validator,
            metrics,
        }
    }

    /// Read-through lookup: cache first, store on a miss, cache populated
    /// from the store result before returning.
    pub async fn get_order(&self, order_uid: &str) -> Result<Order, ServiceError> {
        if let Some(order) = self.cache.get(order_uid) {
            self.metrics.record_cache_lookup(true);
            tracing::debug!(order_uid, "cache hit");
            return Ok(order);
        }
        self.metrics.record_cache_lookup(false);
        tracing::debug!(order_uid, "cache miss");

        let order = self.store.order_by_uid(order_uid).await?;
        self.cache.insert(order.clone());
        Ok(order)
    }

    /// Validates and durably applies an order.
    pub async fn create_order(&self, order: &Order) -> Result<(), ServiceError> {
        self.validator.validate(order)?;
        self.write_through(order).await?;
        Ok(())
    }

    /// The durable half of `create_order`: store write, then cache update.
    /// Exposed separately so the ingestion pipeline can retry exactly this
    /// step without re-running validation.
    pub async fn write_through(&self, order: &Order) -> Result<(), StoreError> {
        self.store.create_order(order).await?;
        self.cache.insert(order.clone());
        Ok(())
    }

    pub fn validate(&self, order: &Order) -> Result<(), ValidationError> {
        self.validator.validate(order)
    }

    /// Warm start: bulk-load the `limit` most recently created orders,
    /// newest first. An order that fails to load is skipped, not fatal.
    pub async fn warm_cache(&self, limit: u64) -> Result<(), ServiceError> {
        let uids = self.store.recent_uids(limit).await?;
        let mut orders = Vec::with_capacity(uids.len());
        for uid in uids {
            match self.store.order_by_uid(&uid).await {
                Ok(order) => orders.push(order),
                Err(err) => {
                    tracing::warn!(order_uid = %uid, error = %err, "skipping order during warm-up");
                }
            }
        }
        let loaded = orders.len();
        self.cache.load_bulk(orders);
        tracing::info!(loaded, "cache warmed from store");
        Ok(())
    }
}
