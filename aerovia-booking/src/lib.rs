pub mod checkout;
pub mod lifecycle;
pub mod models;
pub mod store;

pub use checkout::{CheckoutEngine, CheckoutRequest, ClienteFinal};
pub use lifecycle::ReservationService;
pub use models::{
    new_reservation_code, AgencyReservationLink, BookingStats, Reservation, ReservationDetail,
    ReservationFilter, ReservationItem, ReservationState, ReservationSummary,
};
pub use store::ReservationStore;
