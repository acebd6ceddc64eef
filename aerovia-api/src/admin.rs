use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use uuid::Uuid;

use aerovia_booking::{BookingStats, ReservationDetail, ReservationFilter, ReservationSummary};
use aerovia_core::Principal;

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(filter): Query<ReservationFilter>,
) -> Result<Json<Vec<ReservationSummary>>, AppError> {
    let reservations = state.reservations.admin_list(&principal, &filter).await?;
    Ok(Json(reservations))
}

pub async fn reservation_detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetail>, AppError> {
    let detail = state.reservations.admin_detail(&principal, id).await?;
    Ok(Json(detail))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<BookingStats>, AppError> {
    let stats = state.reservations.stats(&principal).await?;
    Ok(Json(stats))
}
