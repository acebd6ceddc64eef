use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;

use aerovia_booking::{ReservationDetail, ReservationSummary};
use aerovia_core::notify::TicketData;
use aerovia_core::{CoreError, Principal};

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_mine(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<ReservationSummary>>, AppError> {
    let reservations = state.reservations.list_mine(&principal).await?;
    Ok(Json(reservations))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReservationDetail>, AppError> {
    let detail = state.reservations.detail(&principal, id).await?;
    Ok(Json(detail))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .reservations
        .cancel(&principal, id, principal.is_admin())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Renders the itinerary as a downloadable PDF. The detail call carries
/// the ownership check, so an outsider gets 403 before any rendering.
pub async fn ticket(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = state.reservations.detail(&principal, id).await?;
    let ticket = TicketData {
        code: detail.reservation.code.clone(),
        buyer_name: detail.buyer_name,
        buyer_email: detail.buyer_email,
        lines: detail
            .reservation
            .items
            .iter()
            .map(|i| format!("{} {} x{}", i.flight_code, i.class_name, i.quantity))
            .collect(),
        total_cents: detail.reservation.total_cents,
    };
    let bytes = state.tickets.render(&ticket)?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"boleto-{}.pdf\"",
        detail.reservation.code
    ))
    .map_err(|e| CoreError::internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
