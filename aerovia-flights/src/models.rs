use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Flight lifecycle. Cancellation is terminal: a cancelled flight never
/// returns to the schedule and never accepts itinerary edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatus {
    Scheduled,
    Cancelled,
}

impl FlightStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FlightStatus::Cancelled)
    }

    pub fn is_bookable(self) -> bool {
        matches!(self, FlightStatus::Scheduled)
    }
}

/// Fare class attached to a departure. Capacity is informational in this
/// core; checkout does not decrement it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareClassConfig {
    pub class_id: i32,
    pub name: String,
    pub total_capacity: i32,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layover {
    pub city: String,
    pub country: String,
    pub minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteInfo {
    pub origin_city: String,
    pub origin_country: String,
    pub destination_city: String,
    pub destination_country: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flight {
    pub id: Uuid,
    pub code: String,
    pub route: RouteInfo,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub status: FlightStatus,
    /// Symmetric round-trip back-reference: if A points at B then B
    /// points at A, and unlinking clears both sides.
    pub paired_flight_id: Option<Uuid>,
    pub fare_classes: Vec<FareClassConfig>,
    pub layovers: Vec<Layover>,
}

impl Flight {
    pub fn fare_class(&self, class_id: i32) -> Option<&FareClassConfig> {
        self.fare_classes.iter().find(|c| c.class_id == class_id)
    }
}

/// Creation payload for a flight. Flights always start Scheduled and
/// unpaired.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightSpec {
    pub code: String,
    pub route: RouteInfo,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub fare_classes: Vec<FareClassConfig>,
    #[serde(default)]
    pub layovers: Vec<Layover>,
}

/// Itinerary edit. Time changes do not change the flight status, but
/// they always require a change reason for the notification fan-out.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleUpdate {
    pub code: String,
    pub depart_at: DateTime<Utc>,
    pub arrive_at: DateTime<Utc>,
    pub fare_classes: Vec<FareClassConfig>,
    #[serde(alias = "motivoCambio")]
    pub change_reason: String,
}

/// Recipient of a schedule-change or cancellation notice: a user holding
/// a Pending/Confirmed reservation item on the flight.
#[derive(Debug, Clone)]
pub struct Reservee {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
}
