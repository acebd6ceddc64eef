use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reservation lifecycle. The item list is immutable once created; the
/// only mutation afterwards is the state-only transition to Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationState {
    pub fn is_cancellable(self) -> bool {
        matches!(self, ReservationState::Pending | ReservationState::Confirmed)
    }
}

/// Snapshot of a cart item taken at checkout. Route and schedule display
/// fields are frozen here so later flight edits never retroactively
/// alter a printed itinerary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationItem {
    pub flight_id: Uuid,
    pub flight_code: String,
    pub fare_class_id: i32,
    pub class_name: String,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub origin: String,
    pub destination: String,
    /// Display fields of the paired return leg, when the flight was part
    /// of a round trip at booking time.
    pub return_code: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub code: String,
    pub state: ReservationState,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReservationItem>,
}

/// Reservation plus the owner audit fields the detail views and the
/// ticket renderer need.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationDetail {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub buyer_name: String,
    pub buyer_email: String,
}

/// Recorded when an agency checks out on behalf of an end customer;
/// attributes the sale for commission and reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyReservationLink {
    pub reservation_id: Uuid,
    pub agency_user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationSummary {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub buyer_email: String,
    pub code: String,
    pub state: ReservationState,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Composable admin listing filter; every field is optional and they
/// conjoin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationFilter {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub flight_id: Option<Uuid>,
    #[serde(default)]
    pub flight_code: Option<String>,
    #[serde(default)]
    pub created_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: Option<ReservationState>,
}

/// Read-only aggregates for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct BookingStats {
    pub reservations_total: u64,
    pub reservations_pending: u64,
    pub reservations_confirmed: u64,
    pub reservations_cancelled: u64,
    /// Sum over non-cancelled reservations.
    pub revenue_cents: i64,
    pub flights_scheduled: u64,
    pub flights_cancelled: u64,
}

pub fn new_reservation_code() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_cancellable() {
        assert!(ReservationState::Pending.is_cancellable());
        assert!(ReservationState::Confirmed.is_cancellable());
        assert!(!ReservationState::Cancelled.is_cancellable());
    }

    #[test]
    fn reservation_codes_are_short_and_uppercase() {
        let code = new_reservation_code();
        assert_eq!(code.len(), 6);
        assert_eq!(code, code.to_uppercase());
    }
}
