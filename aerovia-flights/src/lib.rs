pub mod models;
pub mod notify;
pub mod schedule;
pub mod store;

pub use models::{
    FareClassConfig, Flight, FlightSpec, FlightStatus, Layover, Reservee, RouteInfo,
    ScheduleUpdate,
};
pub use notify::FlightNotifier;
pub use schedule::ScheduleService;
pub use store::FlightStore;
