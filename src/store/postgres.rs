use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::{OrderStore, StoreError};
use crate::models::{Delivery, Item, Order, Payment};

// ============================================================================
// PostgreSQL Order Store
// ============================================================================
//
// Orders span four tables: orders, delivery, payment, items (keyed by
// order_uid; payment keys on order_id). Reads and writes run inside one
// transaction so an order is only ever observed whole. The base insert uses
// ON CONFLICT DO NOTHING, which makes redelivery of the same identifier a
// no-op rather than a duplicate.
//
// ============================================================================

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"INSERT INTO orders (order_uid, track_number, entry, locale,
                internal_signature, customer_id, delivery_service, shardkey,
                sm_id, date_created, oof_shard)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               ON CONFLICT (order_uid) DO NOTHING"#,
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Already stored under this identifier: nothing to add.
        if inserted == 0 {
            tx.rollback().await?;
            tracing::debug!(order_uid = %order.order_uid, "duplicate write ignored");
            return Ok(());
        }

        sqlx::query(
            r#"INSERT INTO delivery (order_uid, name, phone, zip, city,
                address, region, email)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&order.order_uid)
        .bind(&order.delivery.name)
        .bind(&order.delivery.phone)
        .bind(&order.delivery.zip)
        .bind(&order.delivery.city)
        .bind(&order.delivery.address)
        .bind(&order.delivery.region)
        .bind(&order.delivery.email)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO payment (order_id, transaction, request_id,
                currency, provider, amount, payment_dt, bank, delivery_cost,
                goods_total, custom_fee)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(&order.order_uid)
        .bind(&order.payment.transaction)
        .bind(&order.payment.request_id)
        .bind(&order.payment.currency)
        .bind(&order.payment.provider)
        .bind(order.payment.amount)
        .bind(order.payment.payment_dt)
        .bind(&order.payment.bank)
        .bind(order.payment.delivery_cost)
        .bind(order.payment.goods_total)
        .bind(order.payment.custom_fee)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r#"INSERT INTO items (order_uid, chrt_id, track_number, price,
                    rid, name, sale, size, total_price, nm_id, brand, status)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"#,
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn order_by_uid(&self, order_uid: &str) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let base = sqlx::query(
            r#"SELECT track_number, entry, locale, internal_signature,
                customer_id, delivery_service, shardkey, sm_id, date_created,
                oof_shard
               FROM orders WHERE order_uid = $1"#,
        )
        .bind(order_uid)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound)?;

        let delivery_row = sqlx::query(
            r#"SELECT name, phone, zip, city, address, region, email
               FROM delivery WHERE order_uid = $1"#,
        )
        .bind(order_uid)
        .fetch_one(&mut *tx)
        .await
        .map_err(part_error)?;

        let payment_row = sqlx::query(
            r#"SELECT transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
               FROM payment WHERE order_id = $1"#,
        )
        .bind(order_uid)
        .fetch_one(&mut *tx)
        .await
        .map_err(part_error)?;

        let item_rows = sqlx::query(
            r#"SELECT chrt_id, track_number, price, rid, name, sale, size,
                total_price, nm_id, brand, status
               FROM items WHERE order_uid = $1"#,
        )
        .bind(order_uid)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut items = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            items.push(Item {
                chrt_id: row.try_get("chrt_id")?,
                track_number: row.try_get("track_number")?,
                price: row.try_get("price")?,
                rid: row.try_get("rid")?,
                name: row.try_get("name")?,
                sale: row.try_get("sale")?,
                size: row.try_get("size")?,
                total_price: row.try_get("total_price")?,
                nm_id: row.try_get("nm_id")?,
                brand: row.try_get("brand")?,
                status: row.try_get("status")?,
            });
        }

        Ok(Order {
            order_uid: order_uid.to_string(),
            track_number: base.try_get("track_number")?,
            entry: base.try_get("entry")?,
            locale: base.try_get("locale")?,
            internal_signature: base.try_get("internal_signature")?,
            customer_id: base.try_get("customer_id")?,
            delivery_service: base.try_get("delivery_service")?,
            shardkey: base.try_get("shardkey")?,
            sm_id: base.try_get("sm_id")?,
            date_created: base.try_get("date_created")?,
            oof_shard: base.try_get("oof_shard")?,
            delivery: Delivery {
                name: delivery_row.try_get("name")?,
                phone: delivery_row.try_get("phone")?,
                zip: delivery_row.try_get("zip")?,
                city: delivery_row.try_get("city")?,
                address: delivery_row.try_get("address")?,
                region: delivery_row.try_get("region")?,
                email: delivery_row.try_get("email")?,
            },
            payment: Payment {
                transaction: payment_row.try_get("transaction")?,
                request_id: payment_row.try_get("request_id")?,
                currency: payment_row.try_get("currency")?,
                provider: payment_row.try_get("provider")?,
                amount: payment_row.try_get("amount")?,
                payment_dt: payment_row.try_get("payment_dt")?,
                bank: payment_row.try_get("bank")?,
                delivery_cost: payment_row.try_get("delivery_cost")?,
                goods_total: payment_row.try_get("goods_total")?,
                custom_fee: payment_row.try_get("custom_fee")?,
            },
            items,
        })
    }

    async fn recent_uids(&self, limit: u64) -> Result<Vec<String>, StoreError> {
        let uids = sqlx::query_scalar::<_, String>(
            "SELECT order_uid FROM orders ORDER BY date_created DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(uids)
    }
}

/// A committed order must have its delivery and payment rows; their absence
/// is corruption, not a lookup miss.
fn part_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::Query(sqlx::Error::RowNotFound),
        other => StoreError::from(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_errors_classify_for_retry() {
        use crate::utils::IsTransient;

        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        )))
        .is_transient());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_transient());
        assert!(!StoreError::from(sqlx::Error::ColumnNotFound("name".into())).is_transient());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
        // A missing nested part is corruption, not a miss.
        assert!(matches!(
            part_error(sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
    }
}
