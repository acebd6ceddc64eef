use axum::{
    http::Method,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod error;
pub mod flights;
pub mod identity;
pub mod reservations;
pub mod state;

pub use error::AppError;
pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    // Catalog reads stay open so the storefront can browse without a
    // session; everything else goes through the identity resolver.
    let public = Router::new()
        .route("/flights", get(flights::list_flights))
        .route("/flights/{id}", get(flights::get_flight));

    let authed = Router::new()
        .route("/cart", get(cart::get_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{id}",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route("/checkout", post(checkout::checkout))
        .route("/reservations", get(reservations::list_mine))
        .route("/reservations/{id}", get(reservations::detail))
        .route("/reservations/{id}/cancel", post(reservations::cancel))
        .route("/reservations/{id}/ticket.pdf", get(reservations::ticket))
        .route("/admin/reservations", get(admin::list_reservations))
        .route("/admin/reservations/{id}", get(admin::reservation_detail))
        .route("/admin/stats", get(admin::stats))
        .route("/flights", post(flights::create_flight))
        .route("/flights/{id}", put(flights::update_flight))
        .route("/flights/{id}/state", put(flights::set_state))
        .route("/flights/roundtrip", post(flights::create_round_trip))
        .route("/flights/link", post(flights::link))
        .route("/flights/{id}/unlink", put(flights::unlink))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity::resolve_principal,
        ));

    Router::new()
        .merge(public)
        .merge(authed)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
