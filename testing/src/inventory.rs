//! In-memory inventory store.
//!
//! Emulates the consistency contract of the production store: name is the
//! natural key, upserts add to the allocation, and a purchase applies all of
//! its writes or none. The whole purchase runs under one lock, which stands in
//! for the row lock of the relational backend.
//!
//! Failures can be injected at each step of the purchase transaction to check
//! that nothing partial is ever left behind.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use ticket_inventory_core::{
    InventoryStore, NewTicketOption, Purchase, StoreError, StoreFuture, TicketOption,
    TicketOptionId,
};
use ticket_inventory_runtime::retry::{RetryError, RetryPolicy, retry_with_predicate};
use tokio::sync::Mutex;

/// Step of the purchase transaction at which an injected failure fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// Reading the current allocation (`Database` error)
    Read,
    /// Writing the purchase row (`Database` error)
    Insert,
    /// Decrementing the allocation (`Database` error)
    Decrement,
    /// Committing (`Conflict`, so the store retries)
    Commit,
}

#[derive(Debug, Default)]
struct Inner {
    options: BTreeMap<TicketOptionId, TicketOption>,
    by_name: HashMap<String, TicketOptionId>,
    purchases: Vec<Purchase>,
    next_id: i32,
    injected: Option<(FailurePoint, usize)>,
    closed: bool,
}

impl Inner {
    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn fire(&mut self, point: FailurePoint) -> Result<(), StoreError> {
        let Some((armed, remaining)) = self.injected.as_mut() else {
            return Ok(());
        };
        if *armed != point {
            return Ok(());
        }

        *remaining -= 1;
        if *remaining == 0 {
            self.injected = None;
        }

        Err(match point {
            FailurePoint::Commit => {
                StoreError::Conflict("injected commit conflict".to_string())
            }
            other => StoreError::Database(format!("injected failure at {other:?}")),
        })
    }

    fn purchase(
        &mut self,
        id: TicketOptionId,
        quantity: i32,
        user_id: &str,
    ) -> Result<Purchase, StoreError> {
        self.check_open()?;

        self.fire(FailurePoint::Read)?;
        let available = self
            .options
            .get(&id)
            .map(|option| option.allocation)
            .ok_or(StoreError::NotFound(id))?;

        if available < quantity {
            return Err(StoreError::InsufficientAllocation {
                id,
                requested: quantity,
                available,
            });
        }

        // Writes are staged and only applied once every step has passed.
        self.fire(FailurePoint::Insert)?;
        let purchase = Purchase {
            ticket_option_id: id,
            quantity,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        self.fire(FailurePoint::Decrement)?;
        let remaining = available - quantity;

        self.fire(FailurePoint::Commit)?;
        if let Some(option) = self.options.get_mut(&id) {
            option.allocation = remaining;
        }
        self.purchases.push(purchase.clone());
        Ok(purchase)
    }
}

/// In-memory [`InventoryStore`] for tests.
///
/// # Example
///
/// ```
/// use ticket_inventory_testing::InMemoryInventoryStore;
/// use ticket_inventory_core::{InventoryStore, NewTicketOption};
///
/// # tokio_test::block_on(async {
/// let store = InMemoryInventoryStore::new();
/// let option = store
///     .upsert_ticket_option(NewTicketOption::new("GA", "General", 10))
///     .await
///     .unwrap();
/// store.purchase_ticket(option.id, 3, "u-1".to_string()).await.unwrap();
///
/// assert_eq!(store.get_ticket_option(option.id).await.unwrap().allocation, 7);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryInventoryStore {
    inner: Mutex<Inner>,
    retry: RetryPolicy,
    latency: Duration,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInventoryStore {
    /// Create an empty store. Conflicts are retried up to 3 times without delay.
    #[must_use]
    pub fn new() -> Self {
        Self::with_retry_policy(
            RetryPolicy::builder()
                .initial_delay(Duration::ZERO)
                .max_delay(Duration::ZERO)
                .build(),
        )
    }

    /// Create an empty store with a specific retry policy for purchases.
    #[must_use]
    pub fn with_retry_policy(retry: RetryPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
            retry,
            latency: Duration::ZERO,
        }
    }

    /// Delay every upsert, purchase and read by `latency` before it runs.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Make the next `times` purchase attempts fail at `point`.
    pub async fn inject_failure(&self, point: FailurePoint, times: usize) {
        let mut inner = self.inner.lock().await;
        inner.injected = (times > 0).then_some((point, times));
    }

    /// All committed purchases, oldest first.
    pub async fn purchases(&self) -> Vec<Purchase> {
        self.inner.lock().await.purchases.clone()
    }

    /// Committed purchases for one option.
    pub async fn purchases_for(&self, id: TicketOptionId) -> Vec<Purchase> {
        self.inner
            .lock()
            .await
            .purchases
            .iter()
            .filter(|purchase| purchase.ticket_option_id == id)
            .cloned()
            .collect()
    }

    /// Number of distinct ticket options.
    pub async fn ticket_option_count(&self) -> usize {
        self.inner.lock().await.options.len()
    }

    /// Whether [`InventoryStore::close`] has been called.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn upsert_ticket_option(&self, option: NewTicketOption) -> StoreFuture<'_, TicketOption> {
        Box::pin(async move {
            self.simulate_latency().await;
            let mut inner = self.inner.lock().await;
            inner.check_open()?;

            if let Some(id) = inner.by_name.get(&option.name).copied() {
                let existing = inner
                    .options
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::Database(format!("dangling name index for {id}")))?;
                existing.allocation = existing
                    .allocation
                    .checked_add(option.allocation)
                    .ok_or_else(|| StoreError::Database("integer out of range".to_string()))?;
                return Ok(existing.clone());
            }

            let id = TicketOptionId::new(inner.next_id);
            inner.next_id += 1;
            let created = TicketOption {
                id,
                name: option.name,
                desc: option.desc,
                allocation: option.allocation,
            };
            inner.by_name.insert(created.name.clone(), id);
            inner.options.insert(id, created.clone());
            Ok(created)
        })
    }

    fn purchase_ticket(
        &self,
        id: TicketOptionId,
        quantity: i32,
        user_id: String,
    ) -> StoreFuture<'_, Purchase> {
        Box::pin(async move {
            self.simulate_latency().await;
            let user_id = user_id.as_str();
            let attempt =
                move || async move { self.inner.lock().await.purchase(id, quantity, user_id) };

            retry_with_predicate(&self.retry, attempt, StoreError::is_retryable)
                .await
                .map_err(|err| match err {
                    RetryError::Permanent(err) => err,
                    RetryError::Exhausted {
                        attempts,
                        last_error,
                    } => StoreError::RetriesExhausted {
                        attempts,
                        last_error: last_error.to_string(),
                    },
                })
        })
    }

    fn get_ticket_option(&self, id: TicketOptionId) -> StoreFuture<'_, TicketOption> {
        Box::pin(async move {
            self.simulate_latency().await;
            let inner = self.inner.lock().await;
            inner.check_open()?;
            inner.options.get(&id).cloned().ok_or(StoreError::NotFound(id))
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.inner.lock().await.check_open() })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.closed = true;
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn seeded(allocation: i32) -> (InMemoryInventoryStore, TicketOptionId) {
        let store = InMemoryInventoryStore::new();
        let option = store
            .upsert_ticket_option(NewTicketOption::new("GA", "General", allocation))
            .await
            .unwrap();
        (store, option.id)
    }

    #[tokio::test]
    async fn upsert_is_additive_by_name() {
        let store = InMemoryInventoryStore::new();
        let first = store
            .upsert_ticket_option(NewTicketOption::new("GA", "General", 10))
            .await
            .unwrap();
        let second = store
            .upsert_ticket_option(NewTicketOption::new("GA", "Ignored", 5))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.allocation, 15);
        assert_eq!(second.desc, "General");
        assert_eq!(store.ticket_option_count().await, 1);
    }

    #[tokio::test]
    async fn restock_past_i32_max_is_rejected() {
        let (store, id) = seeded(i32::MAX - 1).await;

        let err = store
            .upsert_ticket_option(NewTicketOption::new("GA", "", 2))
            .await
            .unwrap_err();

        assert_eq!(err, StoreError::Database("integer out of range".to_string()));
        assert_eq!(
            store.get_ticket_option(id).await.unwrap().allocation,
            i32::MAX - 1
        );
    }

    #[tokio::test]
    async fn latency_delays_reads() {
        let (store, id) = seeded(1).await;
        let store = store.with_latency(Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        store.get_ticket_option(id).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn failures_before_commit_leave_no_trace() {
        for point in [FailurePoint::Read, FailurePoint::Insert, FailurePoint::Decrement] {
            let (store, id) = seeded(10).await;
            store.inject_failure(point, 1).await;

            let err = store.purchase_ticket(id, 4, "u".into()).await.unwrap_err();
            assert!(matches!(err, StoreError::Database(_)), "{point:?}: {err}");
            assert_eq!(store.get_ticket_option(id).await.unwrap().allocation, 10);
            assert!(store.purchases().await.is_empty());
        }
    }

    #[tokio::test]
    async fn commit_conflicts_are_retried() {
        let (store, id) = seeded(10).await;
        store.inject_failure(FailurePoint::Commit, 2).await;

        store.purchase_ticket(id, 4, "u".into()).await.unwrap();
        assert_eq!(store.get_ticket_option(id).await.unwrap().allocation, 6);
        assert_eq!(store.purchases_for(id).await.len(), 1);
    }

    #[tokio::test]
    async fn persistent_conflicts_exhaust_retries() {
        let (store, id) = seeded(10).await;
        store.inject_failure(FailurePoint::Commit, 100).await;

        let err = store.purchase_ticket(id, 4, "u".into()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::RetriesExhausted {
                attempts: 4,
                last_error: "write conflict: injected commit conflict".to_string(),
            }
        );
        assert_eq!(store.get_ticket_option(id).await.unwrap().allocation, 10);
        assert!(store.purchases().await.is_empty());
    }

    #[tokio::test]
    async fn closed_store_rejects_everything() {
        let (store, id) = seeded(1).await;
        store.close().await;
        store.close().await;

        assert!(store.is_closed().await);
        assert_eq!(store.ping().await, Err(StoreError::Closed));
        assert_eq!(store.get_ticket_option(id).await, Err(StoreError::Closed));
        assert_eq!(
            store.purchase_ticket(id, 1, "u".into()).await,
            Err(StoreError::Closed)
        );
    }
}
