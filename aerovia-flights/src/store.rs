use async_trait::async_trait;
use uuid::Uuid;

use aerovia_core::CoreResult;

use crate::models::{Flight, FlightSpec, Reservee, ScheduleUpdate};

/// Transactional data-access boundary for flight state. State checks
/// (cancelled-is-terminal, already-paired) run inside the same
/// transaction as the write and surface as typed `Conflict`/`NotFound`
/// errors, never as raw storage text.
#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn create(&self, spec: &FlightSpec) -> CoreResult<Flight>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Flight>>;

    async fn list(&self) -> CoreResult<Vec<Flight>>;

    /// Applies an itinerary edit. A cancelled flight is a `Conflict`.
    async fn apply_schedule(&self, id: Uuid, update: &ScheduleUpdate) -> CoreResult<Flight>;

    /// Scheduled -> Cancelled. Re-cancelling is a `Conflict`, not a
    /// no-op.
    async fn set_cancelled(&self, id: Uuid) -> CoreResult<Flight>;

    /// Sets `paired_flight_id` on both sides in one transaction. Either
    /// side already being paired is a `Conflict`.
    async fn link_pair(&self, outbound_id: Uuid, return_id: Uuid) -> CoreResult<()>;

    /// Clears the pairing on the flight and on whichever flight points
    /// back at it, in one transaction.
    async fn unlink_pair(&self, id: Uuid) -> CoreResult<()>;

    /// Distinct users holding a Pending/Confirmed reservation item on
    /// the flight; disabled accounts are excluded.
    async fn reservees(&self, flight_id: Uuid) -> CoreResult<Vec<Reservee>>;
}
