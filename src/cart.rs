//! Cart value transforms.
//!
//! The cart is client-held session state, one cart per user. These transforms
//! are pure: each returns a new cart instead of mutating in place. Invariants
//! kept here: at most one entry per `menu_item_id`, and no entry ever carries
//! a non-positive quantity.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub menu_item_id: String,
    pub name: String,
    /// Unit price in cents.
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub bg_color: String,
}

/// Adds one unit of `item`. An entry with the same `menu_item_id` has its
/// quantity incremented; otherwise the item is appended with quantity 1. The
/// quantity on the incoming item is ignored.
pub fn add_item(cart: &[CartItem], item: &CartItem) -> Vec<CartItem> {
    if cart.iter().any(|i| i.menu_item_id == item.menu_item_id) {
        return cart
            .iter()
            .map(|i| {
                if i.menu_item_id == item.menu_item_id {
                    CartItem {
                        quantity: i.quantity + 1,
                        ..i.clone()
                    }
                } else {
                    i.clone()
                }
            })
            .collect();
    }

    let mut next = cart.to_vec();
    next.push(CartItem {
        quantity: 1,
        ..item.clone()
    });
    next
}

/// Sets the quantity of an entry. Zero or negative removes it entirely;
/// an unknown `menu_item_id` is a no-op. Values past `u32::MAX` saturate,
/// so an entry can never end up with a non-positive quantity.
pub fn set_quantity(cart: &[CartItem], menu_item_id: &str, quantity: i64) -> Vec<CartItem> {
    if quantity <= 0 {
        return remove_item(cart, menu_item_id);
    }
    let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

    cart.iter()
        .map(|i| {
            if i.menu_item_id == menu_item_id {
                CartItem {
                    quantity,
                    ..i.clone()
                }
            } else {
                i.clone()
            }
        })
        .collect()
}

/// Removes the entry if present; no-op otherwise.
pub fn remove_item(cart: &[CartItem], menu_item_id: &str) -> Vec<CartItem> {
    cart.iter()
        .filter(|i| i.menu_item_id != menu_item_id)
        .cloned()
        .collect()
}

/// Exact cents total over the cart.
pub fn total(cart: &[CartItem]) -> i64 {
    cart.iter()
        .map(|i| i.unit_price * i64::from(i.quantity))
        .sum()
}

/// Two-decimal display string for a cents amount. Display only; order
/// subtotals always use the exact cents value.
pub fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}
