use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One cart line as persisted. Unique on (user, flight, fare class);
/// re-adding the same pair increments the quantity instead of inserting
/// a duplicate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub fare_class_id: i32,
    /// Always >= 1; removing the last unit deletes the row.
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl CartItem {
    pub fn subtotal_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }
}

/// Cart line decorated with the flight display fields the UI and the
/// confirmation email need.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub flight_id: Uuid,
    pub flight_code: String,
    pub fare_class_id: i32,
    pub class_name: String,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

/// Ephemeral aggregate, recomputed on every read. An empty cart is a
/// valid cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_cents: i64,
}

impl Cart {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            items: Vec::new(),
            total_cents: 0,
        }
    }

    pub fn from_lines(user_id: Uuid, items: Vec<CartLine>) -> Self {
        let total_cents = items.iter().map(|l| l.subtotal_cents).sum();
        Self {
            user_id,
            items,
            total_cents,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
