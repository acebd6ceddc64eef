use axum::{extract::State, http::StatusCode, Extension, Json};
use serde_json::{json, Value};

use aerovia_booking::CheckoutRequest;
use aerovia_core::Principal;

use crate::error::AppError;
use crate::state::AppState;

pub async fn checkout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let reservation = state.checkout.checkout(&principal, &request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "idReserva": reservation.id })),
    ))
}
