use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aerovia_api::{app, AppState, AuthConfig};
use aerovia_booking::{CheckoutEngine, ReservationService, ReservationStore};
use aerovia_cart::{CartService, CartStore};
use aerovia_core::notify::{LogMailer, Mailer, StubTicketRenderer, TicketRenderer};
use aerovia_core::AccountStore;
use aerovia_flights::{FlightNotifier, FlightStore, ScheduleService};
use aerovia_store::{Config, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aerovia_api=debug,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting Aerovía API on port {}", config.server.port);

    let (accounts, cart_store, flight_store, reservation_store): (
        Arc<dyn AccountStore>,
        Arc<dyn CartStore>,
        Arc<dyn FlightStore>,
        Arc<dyn ReservationStore>,
    ) = if config.database.url.is_empty() {
        tracing::warn!("database.url vacío; se usa el backend en memoria (no persistente)");
        let store = MemoryStore::new();
        (store.clone(), store.clone(), store.clone(), store)
    } else {
        let store = Arc::new(
            PgStore::connect(&config.database.url)
                .await
                .expect("Failed to connect to Postgres"),
        );
        store.migrate().await.expect("Failed to run migrations");
        (store.clone(), store.clone(), store.clone(), store)
    };

    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer);
    let tickets: Arc<dyn TicketRenderer> = Arc::new(StubTicketRenderer);

    let notifier = FlightNotifier::new(flight_store.clone(), mailer.clone());
    let schedule = Arc::new(ScheduleService::new(flight_store, notifier));
    let carts = Arc::new(CartService::new(cart_store.clone()));
    let checkout = Arc::new(CheckoutEngine::new(
        cart_store,
        reservation_store.clone(),
        accounts.clone(),
        mailer,
    ));
    let reservations = Arc::new(ReservationService::new(reservation_store));

    let app_state = AppState {
        accounts,
        carts,
        checkout,
        reservations,
        schedule,
        tickets,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
