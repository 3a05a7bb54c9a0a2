pub mod postgres;

pub use postgres::PgOrderStore;

use async_trait::async_trait;

use crate::models::Order;
use crate::utils::IsTransient;

// ============================================================================
// Durable Store Contract
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found")]
    NotFound,

    /// Infrastructure-level failure worth retrying: the store itself is
    /// unreachable or out of connections.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// Everything else: bad query, decode mismatch, constraint violation.
    #[error("store query failed: {0}")]
    Query(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            e @ (sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => StoreError::Unavailable(e),
            e => StoreError::Query(e),
        }
    }
}

impl IsTransient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Durable keyed storage for orders. Writes are transactional across the
/// order's nested parts and idempotent per identifier: re-writing an existing
/// identifier must neither error nor duplicate rows.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn order_by_uid(&self, order_uid: &str) -> Result<Order, StoreError>;

    /// Identifiers of the most recently created orders, newest first.
    async fn recent_uids(&self, limit: u64) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// In-memory test double
// ============================================================================
