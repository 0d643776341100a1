//! Domain records shared across the order flow.
//!
//! Monetary amounts are integer cents end to end. The only place a decimal
//! point appears is display formatting ([`crate::cart::format_price`]), so
//! subtotals never accumulate float drift.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Flat delivery fee charged on every order, in cents.
pub const DELIVERY_FEE_CENTS: i64 = 500;

/// Linear order flow: `pending -> processing -> shipped -> delivered`.
///
/// `delivered` is terminal. Historical data spells the terminal state as
/// `completed` in places and mixes letter case; both normalize on parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
}

impl OrderStatus {
    /// The fixed forward table. `None` at the terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Processing),
            Self::Processing => Some(Self::Shipped),
            Self::Shipped => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
        }
    }

    /// Case-insensitive parse; the legacy `completed` spelling maps to
    /// [`OrderStatus::Delivered`]. Anything else is unknown, never defaulted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "shipped" => Some(Self::Shipped),
            "delivered" | "completed" => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown order status: {raw}")))
    }
}

/// One line of an order. This array is the durable contract other tooling
/// reads out of persisted order records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub menu_item_id: String,
    pub name: String,
    /// Unit price in cents.
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(default)]
    pub image: String,
}

impl OrderItem {
    /// Exact cents line total, `None` when it leaves the `i64` range.
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price.checked_mul(i64::from(self.quantity))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: u64,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    /// Exact cents sum of `unit_price * quantity` over `items`.
    pub subtotal: i64,
    pub delivery_fee: i64,
    /// `subtotal + delivery_fee`.
    pub total: i64,
    pub status: OrderStatus,
    pub address: String,
    pub payment_method: String,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout payload posted when a client confirms its cart.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub address: String,
    pub payment_method: String,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(default)]
    pub customer_email: String,
    /// Client-supplied token deduping retried submissions. A repeated token
    /// returns the already-placed order instead of creating a duplicate.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn test_status_parse_variants() {
        assert_eq!(OrderStatus::parse("pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("Pending"), Some(OrderStatus::Pending));
        assert_eq!(OrderStatus::parse("SHIPPED"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("delivered"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::parse("Completed"), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::parse("cancelled"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    #[test]
    fn test_status_forward_table() {
        assert_eq!(OrderStatus::Pending.next(), Some(OrderStatus::Processing));
        assert_eq!(OrderStatus::Processing.next(), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::Shipped.next(), Some(OrderStatus::Delivered));
        assert_eq!(OrderStatus::Delivered.next(), None);
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_serde_normalizes() {
        let status: OrderStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(status, OrderStatus::Delivered);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"delivered\"");
    }
}
