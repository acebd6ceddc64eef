use async_trait::async_trait;
use uuid::Uuid;

use aerovia_core::CoreResult;

use crate::models::{
    AgencyReservationLink, BookingStats, Reservation, ReservationDetail, ReservationFilter,
    ReservationState, ReservationSummary,
};

/// Transactional data-access boundary for reservations.
///
/// `checkout` is the critical atomic section: reading the cart, freezing
/// its items into reservation items and clearing the cart happen in one
/// transaction, so two concurrent checkouts of the same cart cannot both
/// produce a reservation from the same items.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Consumes `cart_owner_id`'s cart into a new reservation owned by
    /// `reservation_owner_id` (they differ on the agency path). An empty
    /// cart is a `Validation` failure and nothing is written.
    async fn checkout(
        &self,
        cart_owner_id: Uuid,
        reservation_owner_id: Uuid,
    ) -> CoreResult<Reservation>;

    async fn get_detail(&self, id: Uuid) -> CoreResult<Option<ReservationDetail>>;

    async fn list_by_user(&self, user_id: Uuid) -> CoreResult<Vec<ReservationSummary>>;

    /// State-only transition to Cancelled. The eligibility check runs in
    /// the same transaction: an already-cancelled reservation is a
    /// `Conflict` and the stored state is left untouched.
    async fn cancel(&self, id: Uuid) -> CoreResult<ReservationState>;

    /// Best-effort from the caller's perspective: a failure here must
    /// not roll back the reservation it refers to.
    async fn record_agency_link(&self, link: &AgencyReservationLink) -> CoreResult<()>;

    async fn list_filtered(&self, filter: &ReservationFilter)
        -> CoreResult<Vec<ReservationSummary>>;

    async fn stats(&self) -> CoreResult<BookingStats>;
}
