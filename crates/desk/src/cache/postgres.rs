//! `PostgreSQL`-backed order cache.
//!
//! Each order is stored whole in a JSONB column next to the few columns the
//! cache filters on.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use stockroom_core::{Order, OrderId, OrderStatus};

use super::{CacheError, OrderCache, validate_all};

/// Embedded migrations from `crates/desk/migrations/`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Order cache stored in `stockroom.order_cache`.
#[derive(Debug, Clone)]
pub struct PgOrderCache {
    pool: PgPool,
}

impl PgOrderCache {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Migration` if a migration fails to apply.
    pub async fn migrate(&self) -> Result<(), CacheError> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    async fn upsert(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), CacheError> {
        sqlx::query(
            r"
            INSERT INTO stockroom.order_cache (id, status, party_name, date_time, record)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                party_name = EXCLUDED.party_name,
                date_time = EXCLUDED.date_time,
                record = EXCLUDED.record,
                updated_at = NOW()
            ",
        )
        .bind(order.id.as_str())
        .bind(order.status.as_str())
        .bind(&order.party_name)
        .bind(order.date_time)
        .bind(Json(order))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

fn decode(id: &str, record: Json<Order>) -> Result<Order, CacheError> {
    let mut order = record.0;
    if order.id.is_empty() {
        order.id = OrderId::new(id);
    } else if order.id.as_str() != id {
        return Err(CacheError::DataCorruption(format!(
            "row {id} holds record for order {}",
            order.id
        )));
    }
    Ok(order)
}

#[async_trait]
impl OrderCache for PgOrderCache {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, CacheError> {
        let row: Option<(String, Json<Order>)> =
            sqlx::query_as("SELECT id, record FROM stockroom.order_cache WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, record)| decode(&id, record)).transpose()
    }

    async fn put(&self, orders: &[Order]) -> Result<(), CacheError> {
        validate_all(orders)?;
        let mut tx = self.pool.begin().await?;
        for order in orders {
            Self::upsert(&mut tx, order).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, CacheError> {
        let rows: Vec<(String, Json<Order>)> = sqlx::query_as(
            r"
            SELECT id, record FROM stockroom.order_cache
            WHERE status = $1
            ORDER BY date_time, id
            ",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, record)| decode(&id, record))
            .collect()
    }

    async fn replace_pending(&self, orders: &[Order]) -> Result<(), CacheError> {
        validate_all(orders)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM stockroom.order_cache WHERE status = $1")
            .bind(OrderStatus::Pending.as_str())
            .execute(&mut *tx)
            .await?;

        for order in orders {
            Self::upsert(&mut tx, order).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, id: &OrderId) -> Result<bool, CacheError> {
        let result = sqlx::query("DELETE FROM stockroom.order_cache WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_decode_fills_missing_id() {
        let order = Order::new(OrderId::default(), "1", "Acme", Utc::now(), Vec::new());
        let decoded = decode("o-1", Json(order)).unwrap();
        assert_eq!(decoded.id.as_str(), "o-1");
    }

    #[test]
    fn test_decode_rejects_mismatched_id() {
        let order = Order::new(OrderId::new("o-2"), "1", "Acme", Utc::now(), Vec::new());
        assert!(matches!(
            decode("o-1", Json(order)),
            Err(CacheError::DataCorruption(_))
        ));
    }
}
