use std::sync::Arc;

use aerovia_booking::{CheckoutEngine, ReservationService};
use aerovia_cart::CartService;
use aerovia_core::notify::TicketRenderer;
use aerovia_core::AccountStore;
use aerovia_flights::ScheduleService;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutEngine>,
    pub reservations: Arc<ReservationService>,
    pub schedule: Arc<ScheduleService>,
    pub tickets: Arc<dyn TicketRenderer>,
    pub auth: AuthConfig,
}
