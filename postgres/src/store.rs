//! `PostgreSQL` implementation of [`InventoryStore`].
//!
//! # Purchase protocol
//!
//! Each purchase attempt is one transaction:
//!
//! 1. `SELECT allocation ... FOR UPDATE` takes the row lock, so concurrent
//!    buyers of the same option queue up behind each other
//! 2. Business checks run against the locked value
//! 3. The purchase row is inserted
//! 4. The allocation is decremented with a guard (`allocation >= $q`) so the
//!    write can never drive it negative even if the lock were bypassed
//! 5. Commit
//!
//! Serialization failures, deadlocks, a guard miss and commit failures are all
//! reported as [`StoreError::Conflict`] and the whole transaction is retried
//! according to the store's [`RetryPolicy`].

use crate::PostgresConfig;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use ticket_inventory_core::{
    InventoryStore, NewTicketOption, Purchase, StoreError, StoreFuture, TicketOption,
    TicketOptionId,
};
use ticket_inventory_runtime::metrics::InventoryMetrics;
use ticket_inventory_runtime::retry::{RetryError, RetryPolicy, retry_with_predicate};

/// SQLSTATE codes that mean "try the transaction again".
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map a sqlx error onto the store's error vocabulary.
fn map_sqlx_error(context: &str, err: &sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err)
            if matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
            ) =>
        {
            StoreError::Conflict(format!("{context}: {db_err}"))
        }
        sqlx::Error::PoolClosed => StoreError::Closed,
        other => StoreError::Database(format!("{context}: {other}")),
    }
}

/// `PostgreSQL`-backed inventory store.
///
/// Cloning is cheap; clones share the connection pool.
///
/// # Example
///
/// ```no_run
/// use ticket_inventory_postgres::{PostgresConfig, PostgresInventoryStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresInventoryStore::connect(&PostgresConfig::new("postgres://localhost/tickets")).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresInventoryStore {
    /// Open a connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if no connection can be established
    /// within the configured timeout.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", &e))?;

        tracing::info!(
            max_connections = config.max_connections,
            "Connected to PostgreSQL"
        );
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool, using the default retry policy.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for purchase transactions.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run the embedded migrations. Safe to call on every startup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        tracing::debug!("Schema migrations applied");
        Ok(())
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn row_to_ticket_option(row: &PgRow) -> Result<TicketOption, StoreError> {
        let read = |e: sqlx::Error| map_sqlx_error("decode ticket option", &e);
        Ok(TicketOption {
            id: TicketOptionId::new(row.try_get("id").map_err(read)?),
            name: row.try_get("name").map_err(read)?,
            desc: row.try_get("description").map_err(read)?,
            allocation: row.try_get("allocation").map_err(read)?,
        })
    }

    /// One attempt of the purchase transaction.
    async fn try_purchase(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: &str,
    ) -> Result<Purchase, StoreError> {
        self.check_open()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin transaction", &e))?;

        let available: Option<i32> =
            sqlx::query_scalar("SELECT allocation FROM ticket_options WHERE id = $1 FOR UPDATE")
                .bind(id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock ticket option", &e))?;

        let Some(available) = available else {
            rollback(tx).await;
            return Err(StoreError::NotFound(id));
        };

        if available < quantity {
            rollback(tx).await;
            return Err(StoreError::InsufficientAllocation {
                id,
                requested: quantity,
                available,
            });
        }

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r"
            INSERT INTO purchases (quantity, user_id, ticket_option_id)
            VALUES ($1, $2, $3)
            RETURNING created_at
            ",
        )
        .bind(quantity)
        .bind(user_id)
        .bind(id.get())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert purchase", &e))?;

        let updated = sqlx::query(
            r"
            UPDATE ticket_options
            SET allocation = allocation - $1
            WHERE id = $2 AND allocation >= $1
            ",
        )
        .bind(quantity)
        .bind(id.get())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("decrement allocation", &e))?;

        if updated.rows_affected() == 0 {
            rollback(tx).await;
            return Err(StoreError::Conflict(format!(
                "allocation of ticket option {id} changed during purchase"
            )));
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Conflict(format!("commit failed: {e}")))?;

        Ok(Purchase {
            ticket_option_id: id,
            quantity,
            user_id: user_id.to_string(),
            created_at,
        })
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "Rollback failed");
    }
}

impl InventoryStore for PostgresInventoryStore {
    fn upsert_ticket_option(&self, option: NewTicketOption) -> StoreFuture<'_, TicketOption> {
        Box::pin(async move {
            self.check_open()?;

            let row = sqlx::query(
                r"
                INSERT INTO ticket_options (name, description, allocation)
                VALUES ($1, $2, $3)
                ON CONFLICT (name) DO UPDATE
                SET allocation = ticket_options.allocation + EXCLUDED.allocation
                RETURNING id, name, description, allocation
                ",
            )
            .bind(&option.name)
            .bind(&option.desc)
            .bind(option.allocation)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("upsert ticket option", &e))?;

            InventoryMetrics::record_upsert();
            Self::row_to_ticket_option(&row)
        })
    }

    fn purchase_ticket(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: String,
    ) -> StoreFuture<'_, Purchase> {
        Box::pin(async move {
            let started = Instant::now();
            let user_id = user_id.as_str();

            let attempt = move || async move {
                let result = self.try_purchase(id, quantity, user_id).await;
                if matches!(result, Err(StoreError::Conflict(_))) {
                    InventoryMetrics::record_conflict();
                }
                result
            };

            match retry_with_predicate(&self.retry, attempt, StoreError::is_retryable).await {
                Ok(purchase) => {
                    InventoryMetrics::record_committed(started.elapsed());
                    Ok(purchase)
                }
                Err(RetryError::Permanent(err)) => {
                    match &err {
                        StoreError::NotFound(_) => InventoryMetrics::record_rejected("not_found"),
                        StoreError::InsufficientAllocation { .. } => {
                            InventoryMetrics::record_rejected("insufficient_allocation");
                        }
                        _ => {}
                    }
                    Err(err)
                }
                Err(RetryError::Exhausted {
                    attempts,
                    last_error,
                }) => {
                    InventoryMetrics::record_exhausted();
                    Err(StoreError::RetriesExhausted {
                        attempts,
                        last_error: last_error.to_string(),
                    })
                }
            }
        })
    }

    fn get_ticket_option(&self, id: TicketOptionId) -> StoreFuture<'_, TicketOption> {
        Box::pin(async move {
            self.check_open()?;

            let row = sqlx::query(
                "SELECT id, name, description, allocation FROM ticket_options WHERE id = $1",
            )
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get ticket option", &e))?
            .ok_or(StoreError::NotFound(id))?;

            Self::row_to_ticket_option(&row)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_open()?;
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ping", &e))?;
            Ok(())
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.pool.close().await;
            tracing::info!("PostgreSQL pool closed");
        })
    }
}
