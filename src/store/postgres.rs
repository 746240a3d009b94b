//! PostgreSQL order store

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::{OrderStore, StatusCounts};
use crate::config::DatabaseConfig;
use crate::error::{SwapError, SwapResult};
use crate::order::{Direction, Order, OrderStatus};

/// Order store backed by PostgreSQL
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new store with a connection pool
    pub async fn new(config: &DatabaseConfig) -> SwapResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await
            .map_err(SwapError::Database)?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> SwapResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                direction VARCHAR(12) NOT NULL,
                requested_amount DOUBLE PRECISION NOT NULL,
                recipient_address TEXT NOT NULL,
                deposit_address TEXT NOT NULL,
                output_amount DOUBLE PRECISION NOT NULL,
                status VARCHAR(12) NOT NULL,
                deposit_tx_ref TEXT,
                output_tx_ref TEXT,
                created_at TIMESTAMPTZ NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_orders_status_expiry
            ON orders (status, expires_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Postgres unique indexes ignore NULLs, so unclaimed orders are
        // unaffected; once a tx ref is recorded no other order can take it.
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_deposit_tx_ref
            ON orders (deposit_tx_ref)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> SwapResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(SwapError::Database)?;
        Ok(())
    }
}

fn order_from_row(row: &PgRow) -> SwapResult<Order> {
    let direction_str: String = row.get("direction");
    let direction = Direction::parse(&direction_str)
        .ok_or_else(|| SwapError::Internal(format!("unknown direction: {}", direction_str)))?;

    let status_str: String = row.get("status");
    let status = OrderStatus::parse(&status_str)
        .ok_or_else(|| SwapError::Internal(format!("unknown status: {}", status_str)))?;

    Ok(Order {
        id: row.get("id"),
        direction,
        requested_amount: row.get("requested_amount"),
        recipient_address: row.get("recipient_address"),
        deposit_address: row.get("deposit_address"),
        output_amount: row.get("output_amount"),
        status,
        deposit_tx_ref: row.get("deposit_tx_ref"),
        output_tx_ref: row.get("output_tx_ref"),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        expires_at: row.get::<DateTime<Utc>, _>("expires_at"),
    })
}

#[async_trait::async_trait]
impl OrderStore for PgOrderStore {
    async fn create(&self, order: &Order) -> SwapResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders
                (id, direction, requested_amount, recipient_address, deposit_address,
                 output_amount, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(order.id)
        .bind(order.direction.as_str())
        .bind(order.requested_amount)
        .bind(&order.recipient_address)
        .bind(&order.deposit_address)
        .bind(order.output_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(SwapError::DuplicateOrder(order.id))
            }
            Err(e) => Err(SwapError::Database(e)),
        }
    }

    async fn get(&self, id: Uuid) -> SwapResult<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    async fn list_active(&self, now: DateTime<Utc>) -> SwapResult<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM orders
            WHERE status IN ('pending', 'deposited', 'processing')
              AND expires_at > $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> SwapResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'expired'
            WHERE status = 'pending' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            debug!("Expired {} stale orders", expired);
        }
        Ok(expired)
    }

    async fn try_mark_deposited(&self, id: Uuid, deposit_tx_ref: &str) -> SwapResult<bool> {
        // Single guarded UPDATE: the status check and the write are one
        // indivisible statement, so concurrent detections race safely. The
        // unique index on deposit_tx_ref turns a ref already credited to
        // another order into a lost claim rather than a double credit.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'deposited', deposit_tx_ref = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(deposit_tx_ref)
        .execute(&self.pool)
        .await;

        match result {
            Ok(r) => Ok(r.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(false),
            Err(e) => Err(SwapError::Database(e)),
        }
    }

    async fn try_mark_processing(&self, id: Uuid) -> SwapResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'processing'
            WHERE id = $1 AND status = 'deposited'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_completed(&self, id: Uuid, output_tx_ref: &str) -> SwapResult<()> {
        // The caller already won the processing claim; the guard here only
        // protects the monotonicity invariant against misuse.
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'completed', output_tx_ref = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(output_tx_ref)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SwapError::OrderNotFound(id));
        }
        Ok(())
    }

    async fn status_counts(&self) -> SwapResult<StatusCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'deposited') as deposited,
                COUNT(*) FILTER (WHERE status = 'processing') as processing,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'expired') as expired
            FROM orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StatusCounts {
            pending: row.get::<i64, _>("pending") as u64,
            deposited: row.get::<i64, _>("deposited") as u64,
            processing: row.get::<i64, _>("processing") as u64,
            completed: row.get::<i64, _>("completed") as u64,
            expired: row.get::<i64, _>("expired") as u64,
        })
    }
}
