//! # Order lifecycle
//!
//! The one piece of real business logic in this service: turning a checked-out
//! cart into a durable order, walking the order along the fixed flow
//! `pending -> processing -> shipped -> delivered`, and counting active
//! (unterminated) orders.
//!
//! ## Invariants
//!
//! - `subtotal == sum(unit_price * quantity)` and
//!   `total == subtotal + delivery_fee`, exact cents, from creation onward.
//! - Items are immutable once the order exists; only status moves, only
//!   forward, never skipping a stage.
//! - The manager holds no authoritative state of its own. Every read goes to
//!   the store, so counts and listings are always computed from what is
//!   actually persisted.
//!
//! Status advancement is a conditional write on the status the manager just
//! read. A lost race is re-read and retried once, then surfaced as a conflict
//! for the caller to retry.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use tracing::info;

use crate::{
    error::AppError,
    models::{Checkout, Order, OrderStatus, DELIVERY_FEE_CENTS},
    store::{Scope, Store, StoreError},
};

pub struct OrderManager {
    store: Arc<dyn Store>,
    last_id: AtomicU64,
}

impl OrderManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            last_id: AtomicU64::new(0),
        }
    }

    /// Millisecond clock clamped to be strictly increasing per process.
    /// Uniqueness is the hard requirement; monotonicity gives listings a
    /// deterministic tie-break.
    fn next_id(&self) -> u64 {
        let now = Utc::now().timestamp_millis() as u64;
        let mut last = self.last_id.load(Ordering::Relaxed);

        loop {
            let candidate = now.max(last + 1);
            match self.last_id.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// Validates the checkout, computes totals, and durably writes the new
    /// order with `status = pending`. A repeated idempotency key returns the
    /// order the earlier submission already placed.
    pub async fn create_order(&self, checkout: Checkout) -> Result<Order, AppError> {
        validate(&checkout)?;

        let key = checkout.idempotency_key.clone().filter(|k| !k.is_empty());
        if let Some(key) = key.as_deref() {
            if let Some(existing) = self.store.order_by_key(key).await? {
                info!("Replayed checkout for order {}", existing.id);
                return Ok(existing);
            }
        }

        let subtotal = checkout
            .items
            .iter()
            .try_fold(0i64, |acc, item| {
                item.line_total().and_then(|line| acc.checked_add(line))
            })
            .ok_or(AppError::TotalOverflow)?;
        let now = Utc::now();

        let order = Order {
            id: self.next_id(),
            user_id: checkout.user_id,
            items: checkout.items,
            subtotal,
            delivery_fee: DELIVERY_FEE_CENTS,
            total: subtotal + DELIVERY_FEE_CENTS,
            status: OrderStatus::Pending,
            address: checkout.address,
            payment_method: checkout.payment_method,
            customer_name: checkout.customer_name,
            customer_phone: checkout.customer_phone,
            customer_email: checkout.customer_email,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_order(&order, key.as_deref()).await {
            Ok(()) => {}
            // A concurrent submission with the same key won the insert; hand
            // back the order it placed.
            Err(StoreError::KeyInUse) => {
                let existing = match key.as_deref() {
                    Some(key) => self.store.order_by_key(key).await?,
                    None => None,
                };
                return match existing {
                    Some(existing) => {
                        info!("Replayed checkout for order {}", existing.id);
                        Ok(existing)
                    }
                    None => Err(AppError::Conflict),
                };
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            "Placed order {} for user {} ({} items, total {})",
            order.id,
            order.user_id,
            order.items.len(),
            order.total
        );
        Ok(order)
    }

    /// Moves the order one step along the fixed flow. Advancing a delivered
    /// order is rejected. A concurrent advance detected by the conditional
    /// write is re-read and retried once before surfacing a conflict.
    pub async fn advance_status(&self, order_id: u64) -> Result<Order, AppError> {
        let mut order = self.lookup(order_id).await?;

        for attempt in 0..2 {
            let current = order.status;
            let next = current.next().ok_or(AppError::AlreadyDelivered)?;

            match self
                .store
                .advance_order(order_id, current, next, Utc::now())
                .await
            {
                Ok(updated) => {
                    info!("Order {} moved {} -> {}", order_id, current, next);
                    return Ok(updated);
                }
                Err(StoreError::Conflict { .. }) if attempt == 0 => {
                    order = self.lookup(order_id).await?;
                }
                Err(StoreError::Conflict { .. }) => return Err(AppError::Conflict),
                Err(StoreError::NotFound) => return Err(AppError::OrderNotFound),
                Err(e) => return Err(e.into()),
            }
        }

        unreachable!("advance loop always returns within two attempts")
    }

    /// Number of orders in `scope` that have not reached the terminal state,
    /// recomputed from the store on every call.
    pub async fn count_active(&self, scope: &Scope) -> Result<usize, AppError> {
        let orders = self.store.orders(scope).await?;

        Ok(orders.iter().filter(|o| !o.status.is_terminal()).count())
    }

    /// Orders in `scope`, newest first by creation time, ties broken by id
    /// descending.
    pub async fn list_orders(&self, scope: &Scope) -> Result<Vec<Order>, AppError> {
        let mut orders = self.store.orders(scope).await?;

        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn lookup(&self, order_id: u64) -> Result<Order, AppError> {
        self.store.order(order_id).await.map_err(|e| match e {
            StoreError::NotFound => AppError::OrderNotFound,
            other => other.into(),
        })
    }
}

fn validate(checkout: &Checkout) -> Result<(), AppError> {
    if checkout.user_id.trim().is_empty() {
        return Err(AppError::MissingField("userId"));
    }
    if checkout.items.is_empty() {
        return Err(AppError::EmptyCart);
    }

    for item in &checkout.items {
        if item.quantity < 1 {
            return Err(AppError::InvalidQuantity(item.menu_item_id.clone()));
        }
        if item.unit_price < 0 {
            return Err(AppError::NegativePrice(item.menu_item_id.clone()));
        }
    }

    let required = [
        ("customerName", &checkout.customer_name),
        ("customerPhone", &checkout.customer_phone),
        ("address", &checkout.address),
        ("paymentMethod", &checkout.payment_method),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::MissingField(field));
        }
    }

    Ok(())
}
