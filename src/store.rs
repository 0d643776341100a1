//! # Persistence store
//!
//! The one narrow seam between the order lifecycle and durable storage. The
//! lifecycle logic is written once against [`Store`]; backends swap behind it
//! instead of re-implementing the business rules per database.
//!
//! Two backends ship here:
//! - [`MemoryStore`]: hash maps behind an async lock. Each instance owns its
//!   state and is injected where needed, so tests run isolated.
//! - [`JsonStore`]: a flat JSON file of order records, rewritten whole on
//!   every mutation. Small-shop scale, survives restarts.
//!
//! Status advancement goes through a conditional write
//! ([`Store::advance_order`]): the write lands only if the stored status
//! still equals what the caller read, which keeps two concurrent advances
//! from double-skipping a stage.

use std::{collections::HashMap, io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    fs,
    sync::{Mutex, RwLock},
};
use tracing::debug;

use crate::models::{Order, OrderStatus};

/// Which orders a read covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    User(String),
}

impl Scope {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::All => true,
            Self::User(user_id) => order.user_id == *user_id,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conditional write lost: expected {expected}, found {actual}")]
    Conflict {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("idempotency key already used")]
    KeyInUse,

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Durably writes a new order. `idempotency_key`, when present, is
    /// remembered so a retried checkout can find the order it already placed;
    /// a key that is already mapped rejects the whole write with
    /// [`StoreError::KeyInUse`], so two concurrent submissions sharing a key
    /// cannot both insert.
    async fn insert_order(
        &self,
        order: &Order,
        idempotency_key: Option<&str>,
    ) -> Result<(), StoreError>;

    async fn order(&self, id: u64) -> Result<Order, StoreError>;

    /// Orders matching `scope`, in no particular order.
    async fn orders(&self, scope: &Scope) -> Result<Vec<Order>, StoreError>;

    /// Conditional status write: succeeds only while the stored status still
    /// equals `expected`, otherwise [`StoreError::Conflict`].
    async fn advance_order(
        &self,
        id: u64,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, StoreError>;

    async fn order_by_key(&self, idempotency_key: &str) -> Result<Option<Order>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    orders: HashMap<u64, Order>,
    idempotency_keys: HashMap<String, u64>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_order(
        &self,
        order: &Order,
        idempotency_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(key) = idempotency_key {
            if inner.idempotency_keys.contains_key(key) {
                return Err(StoreError::KeyInUse);
            }
            inner.idempotency_keys.insert(key.to_string(), order.id);
        }
        inner.orders.insert(order.id, order.clone());

        Ok(())
    }

    async fn order(&self, id: u64) -> Result<Order, StoreError> {
        let inner = self.inner.read().await;

        inner.orders.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn orders(&self, scope: &Scope) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .orders
            .values()
            .filter(|o| scope.matches(o))
            .cloned()
            .collect())
    }

    async fn advance_order(
        &self,
        id: u64,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let mut inner = self.inner.write().await;
        let order = inner.orders.get_mut(&id).ok_or(StoreError::NotFound)?;

        if order.status != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: order.status,
            });
        }

        order.status = next;
        order.updated_at = updated_at;

        Ok(order.clone())
    }

    async fn order_by_key(&self, idempotency_key: &str) -> Result<Option<Order>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .idempotency_keys
            .get(idempotency_key)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }
}

#[derive(Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JsonData {
    orders: Vec<Order>,
    idempotency_keys: HashMap<String, u64>,
}

/// Flat-file backend. Every operation reads the whole file; mutations rewrite
/// it under a single lock, so conditional writes are checked against the
/// freshly read state.
pub struct JsonStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<JsonData, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
            }
            // A missing file is just an empty store.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(JsonData::default()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    async fn write(&self, data: &JsonData) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(data).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        // Stage next to the target and rename over it, so an interrupted
        // write leaves the committed file untouched.
        let staging = self.staging_path();
        fs::write(&staging, bytes)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        fs::rename(&staging, &self.path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        debug!("Wrote {} orders to {}", data.orders.len(), self.path.display());
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");

        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn insert_order(
        &self,
        order: &Order,
        idempotency_key: Option<&str>,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.read().await?;

        if let Some(key) = idempotency_key {
            if data.idempotency_keys.contains_key(key) {
                return Err(StoreError::KeyInUse);
            }
            data.idempotency_keys.insert(key.to_string(), order.id);
        }
        // Newest first, matching how the file has always been laid out.
        data.orders.insert(0, order.clone());

        self.write(&data).await
    }

    async fn order(&self, id: u64) -> Result<Order, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.read().await?;

        data.orders
            .into_iter()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)
    }

    async fn orders(&self, scope: &Scope) -> Result<Vec<Order>, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.read().await?;

        Ok(data.orders.into_iter().filter(|o| scope.matches(o)).collect())
    }

    async fn advance_order(
        &self,
        id: u64,
        expected: OrderStatus,
        next: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let _guard = self.lock.lock().await;
        let mut data = self.read().await?;

        let order = data
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::NotFound)?;

        if order.status != expected {
            return Err(StoreError::Conflict {
                expected,
                actual: order.status,
            });
        }

        order.status = next;
        order.updated_at = updated_at;
        let updated = order.clone();

        self.write(&data).await?;
        Ok(updated)
    }

    async fn order_by_key(&self, idempotency_key: &str) -> Result<Option<Order>, StoreError> {
        let _guard = self.lock.lock().await;
        let data = self.read().await?;

        Ok(data
            .idempotency_keys
            .get(idempotency_key)
            .and_then(|id| data.orders.iter().find(|o| o.id == *id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{OrderItem, DELIVERY_FEE_CENTS};

    fn order(id: u64, user_id: &str, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id,
            user_id: user_id.to_string(),
            items: vec![OrderItem {
                menu_item_id: "margherita".to_string(),
                name: "Margherita".to_string(),
                unit_price: 1000,
                quantity: 1,
                image: String::new(),
            }],
            subtotal: 1000,
            delivery_fee: DELIVERY_FEE_CENTS,
            total: 1000 + DELIVERY_FEE_CENTS,
            status,
            address: "1 Via Roma".to_string(),
            payment_method: "Cash on Delivery".to_string(),
            customer_name: "Ada".to_string(),
            customer_phone: "555-0100".to_string(),
            customer_email: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_memory_conditional_write_conflict() {
        let store = MemoryStore::default();
        store
            .insert_order(&order(1, "7", OrderStatus::Pending), None)
            .await
            .unwrap();

        // Stale expectation loses.
        let err = store
            .advance_order(1, OrderStatus::Processing, OrderStatus::Shipped, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        // Status untouched by the losing write.
        assert_eq!(store.order(1).await.unwrap().status, OrderStatus::Pending);

        let updated = store
            .advance_order(1, OrderStatus::Pending, OrderStatus::Processing, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_memory_scope_filter() {
        let store = MemoryStore::default();
        store
            .insert_order(&order(1, "7", OrderStatus::Pending), None)
            .await
            .unwrap();
        store
            .insert_order(&order(2, "8", OrderStatus::Pending), None)
            .await
            .unwrap();

        assert_eq!(store.orders(&Scope::All).await.unwrap().len(), 2);

        let user = store
            .orders(&Scope::User("7".to_string()))
            .await
            .unwrap();
        assert_eq!(user.len(), 1);
        assert_eq!(user[0].id, 1);

        assert!(store
            .orders(&Scope::User("9".to_string()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_memory_duplicate_idempotency_key_rejected() {
        let store = MemoryStore::default();
        store
            .insert_order(&order(1, "7", OrderStatus::Pending), Some("key-1"))
            .await
            .unwrap();

        let err = store
            .insert_order(&order(2, "7", OrderStatus::Pending), Some("key-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyInUse));

        // The losing write left nothing behind.
        assert_eq!(store.orders(&Scope::All).await.unwrap().len(), 1);
        assert_eq!(store.order_by_key("key-1").await.unwrap().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");

        {
            let store = JsonStore::new(&path);
            store
                .insert_order(&order(1, "7", OrderStatus::Pending), Some("key-1"))
                .await
                .unwrap();
            store
                .advance_order(1, OrderStatus::Pending, OrderStatus::Processing, Utc::now())
                .await
                .unwrap();
        }

        let reopened = JsonStore::new(&path);
        let loaded = reopened.order(1).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Processing);
        assert_eq!(loaded.total, 1500);

        let by_key = reopened.order_by_key("key-1").await.unwrap().unwrap();
        assert_eq!(by_key.id, 1);

        // Key uniqueness holds across reopen too.
        let err = reopened
            .insert_order(&order(2, "7", OrderStatus::Pending), Some("key-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::KeyInUse));
    }

    #[tokio::test]
    async fn test_json_store_failed_write_keeps_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.json");
        let store = JsonStore::new(&path);
        store
            .insert_order(&order(1, "7", OrderStatus::Pending), None)
            .await
            .unwrap();

        // Block the staging file so the next write cannot land.
        std::fs::create_dir(dir.path().join("orders.json.tmp")).unwrap();

        let err = store
            .insert_order(&order(2, "7", OrderStatus::Pending), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        // The committed order reads back intact.
        let orders = store.orders(&Scope::All).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].id, 1);
    }

    #[tokio::test]
    async fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("never-written.json"));

        assert!(store.orders(&Scope::All).await.unwrap().is_empty());
        assert!(matches!(
            store.order(1).await.unwrap_err(),
            StoreError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_json_store_conflict_detected_on_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("orders.json"));
        store
            .insert_order(&order(1, "7", OrderStatus::Shipped), None)
            .await
            .unwrap();

        let err = store
            .advance_order(1, OrderStatus::Pending, OrderStatus::Processing, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: OrderStatus::Pending,
                actual: OrderStatus::Shipped,
            }
        ));
    }
}
