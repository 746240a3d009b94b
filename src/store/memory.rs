//! In-memory order store for tests
//!
//! Implements the same conditional-transition contract as the Postgres store:
//! each compare-and-set runs under a single lock acquisition, so concurrent
//! callers observe exactly-one-winner semantics. A deposit tx ref can be
//! recorded on at most one order, mirroring the unique index in Postgres.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{OrderStore, StatusCounts};
use crate::error::{SwapError, SwapResult};
use crate::order::{Order, OrderStatus};

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> SwapResult<()> {
        let mut orders = self.orders.lock().await;
        if orders.contains_key(&order.id) {
            return Err(SwapError::DuplicateOrder(order.id));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> SwapResult<Option<Order>> {
        Ok(self.orders.lock().await.get(&id).cloned())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> SwapResult<Vec<Order>> {
        let orders = self.orders.lock().await;
        let mut active: Vec<Order> = orders
            .values()
            .filter(|o| !o.status.is_terminal() && o.expires_at > now)
            .cloned()
            .collect();
        active.sort_by_key(|o| o.created_at);
        Ok(active)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> SwapResult<u64> {
        let mut orders = self.orders.lock().await;
        let mut expired = 0;
        for order in orders.values_mut() {
            if order.status == OrderStatus::Pending && order.expires_at <= now {
                order.status = OrderStatus::Expired;
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn try_mark_deposited(&self, id: Uuid, deposit_tx_ref: &str) -> SwapResult<bool> {
        let mut orders = self.orders.lock().await;
        let ref_claimed = orders
            .values()
            .any(|o| o.deposit_tx_ref.as_deref() == Some(deposit_tx_ref));
        if ref_claimed {
            return Ok(false);
        }
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Pending => {
                order.status = OrderStatus::Deposited;
                order.deposit_tx_ref = Some(deposit_tx_ref.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_mark_processing(&self, id: Uuid) -> SwapResult<bool> {
        let mut orders = self.orders.lock().await;
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Deposited => {
                order.status = OrderStatus::Processing;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_completed(&self, id: Uuid, output_tx_ref: &str) -> SwapResult<()> {
        let mut orders = self.orders.lock().await;
        match orders.get_mut(&id) {
            Some(order) if order.status == OrderStatus::Processing => {
                order.status = OrderStatus::Completed;
                order.output_tx_ref = Some(output_tx_ref.to_string());
                Ok(())
            }
            _ => Err(SwapError::OrderNotFound(id)),
        }
    }

    async fn status_counts(&self) -> SwapResult<StatusCounts> {
        let orders = self.orders.lock().await;
        let mut counts = StatusCounts::default();
        for order in orders.values() {
            match order.status {
                OrderStatus::Pending => counts.pending += 1,
                OrderStatus::Deposited => counts.deposited += 1,
                OrderStatus::Processing => counts.processing += 1,
                OrderStatus::Completed => counts.completed += 1,
                OrderStatus::Expired => counts.expired += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::Direction;
    use chrono::Duration;
    use std::sync::Arc;

    fn sample_order(now: DateTime<Utc>) -> Order {
        Order::new(
            Direction::EthToAda,
            0.5,
            "addr_test1qz...".to_string(),
            "0xescrow".to_string(),
            1000.0,
            now,
            Duration::seconds(1800),
        )
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(Utc::now());
        store.create(&order).await.unwrap();
        assert!(matches!(
            store.create(&order).await,
            Err(SwapError::DuplicateOrder(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_deposit_marks_have_one_winner() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order = sample_order(Utc::now());
        store.create(&order).await.unwrap();

        let attempts = (0..16).map(|i| {
            let store = store.clone();
            let id = order.id;
            tokio::spawn(async move {
                store
                    .try_mark_deposited(id, &format!("0xdeposit{}", i))
                    .await
                    .unwrap()
            })
        });

        let results = futures::future::join_all(attempts).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(winners, 1);

        // The stored ref belongs to the winner and is never overwritten
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Deposited);
        assert!(stored.deposit_tx_ref.unwrap().starts_with("0xdeposit"));
    }

    #[tokio::test]
    async fn concurrent_processing_claims_have_one_winner() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order = sample_order(Utc::now());
        store.create(&order).await.unwrap();
        assert!(store.try_mark_deposited(order.id, "0xdep").await.unwrap());

        let attempts = (0..16).map(|_| {
            let store = store.clone();
            let id = order.id;
            tokio::spawn(async move { store.try_mark_processing(id).await.unwrap() })
        });

        let results = futures::future::join_all(attempts).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(winners, 1);

        // Retries after the claim never succeed again
        assert!(!store.try_mark_processing(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn deposit_ref_backs_at_most_one_order() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        let first = sample_order(now);
        let second = sample_order(now);
        store.create(&first).await.unwrap();
        store.create(&second).await.unwrap();

        assert!(store.try_mark_deposited(first.id, "0xshared").await.unwrap());
        // The same physical transfer cannot be credited to a second order
        assert!(!store.try_mark_deposited(second.id, "0xshared").await.unwrap());

        let loser = store.get(second.id).await.unwrap().unwrap();
        assert_eq!(loser.status, OrderStatus::Pending);
        assert!(loser.deposit_tx_ref.is_none());

        // A distinct deposit still goes through
        assert!(store.try_mark_deposited(second.id, "0xother").await.unwrap());
    }

    #[tokio::test]
    async fn full_lifecycle_is_monotonic() {
        let store = InMemoryOrderStore::new();
        let order = sample_order(Utc::now());
        store.create(&order).await.unwrap();

        assert!(!store.try_mark_processing(order.id).await.unwrap());
        assert!(store.try_mark_deposited(order.id, "0xdep").await.unwrap());
        assert!(!store.try_mark_deposited(order.id, "0xother").await.unwrap());
        assert!(store.try_mark_processing(order.id).await.unwrap());
        store.mark_completed(order.id, "0xout").await.unwrap();

        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.deposit_tx_ref.as_deref(), Some("0xdep"));
        assert_eq!(stored.output_tx_ref.as_deref(), Some("0xout"));

        // Nothing leaves a terminal state
        assert!(!store.try_mark_deposited(order.id, "0xlate").await.unwrap());
        assert!(!store.try_mark_processing(order.id).await.unwrap());
    }

    #[tokio::test]
    async fn expiry_excludes_later_deposits() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();
        let mut order = sample_order(now);
        order.expires_at = now + Duration::seconds(5);
        store.create(&order).await.unwrap();

        // Not expired before the deadline
        assert_eq!(store.expire_stale(now).await.unwrap(), 0);

        let later = now + Duration::seconds(10);
        assert_eq!(store.expire_stale(later).await.unwrap(), 1);
        // Idempotent
        assert_eq!(store.expire_stale(later).await.unwrap(), 0);

        // A deposit arriving after expiry produces no state change
        assert!(!store.try_mark_deposited(order.id, "0xlate").await.unwrap());
        let stored = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Expired);
        assert!(stored.deposit_tx_ref.is_none());
    }

    #[tokio::test]
    async fn list_active_filters_and_orders_by_creation() {
        let store = InMemoryOrderStore::new();
        let now = Utc::now();

        let older = sample_order(now - Duration::seconds(60));
        let newer = sample_order(now);
        let mut expired = sample_order(now - Duration::seconds(7200));
        expired.expires_at = now - Duration::seconds(3600);

        store.create(&newer).await.unwrap();
        store.create(&older).await.unwrap();
        store.create(&expired).await.unwrap();

        let active = store.list_active(now).await.unwrap();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].id, older.id);
        assert_eq!(active[1].id, newer.id);
    }
}
