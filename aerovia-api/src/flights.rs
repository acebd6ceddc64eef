use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use aerovia_core::{CoreError, Principal};
use aerovia_flights::{Flight, FlightSpec, FlightStatus, ScheduleUpdate};

use crate::error::AppError;
use crate::state::AppState;

pub async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state.schedule.list().await?;
    Ok(Json(flights))
}

pub async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Flight>, AppError> {
    let flight = state.schedule.get(id).await?;
    Ok(Json(flight))
}

pub async fn create_flight(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(spec): Json<FlightSpec>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let flight = state.schedule.create_flight(&principal, &spec).await?;
    Ok((StatusCode::CREATED, Json(flight)))
}

pub async fn update_flight(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(update): Json<ScheduleUpdate>,
) -> Result<Json<Flight>, AppError> {
    let flight = state.schedule.update_schedule(&principal, id, &update).await?;
    Ok(Json(flight))
}

#[derive(Debug, Deserialize)]
pub struct StateBody {
    pub estado: FlightStatus,
    #[serde(default)]
    pub motivo: Option<String>,
}

/// The only transition the state machine accepts over the wire is
/// Scheduled -> Cancelled; a cancelled flight never comes back.
pub async fn set_state(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(body): Json<StateBody>,
) -> Result<Json<Flight>, AppError> {
    if body.estado != FlightStatus::Cancelled {
        return Err(CoreError::Validation(
            "Solo se admite la transición a CANCELLED.".to_string(),
        )
        .into());
    }
    let flight = state
        .schedule
        .cancel_flight(&principal, id, body.motivo.as_deref().unwrap_or(""))
        .await?;
    Ok(Json(flight))
}

#[derive(Debug, Deserialize)]
pub struct RoundTripBody {
    pub ida: FlightSpec,
    pub regreso: FlightSpec,
}

pub async fn create_round_trip(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RoundTripBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let (ida, regreso) = state
        .schedule
        .create_round_trip(&principal, &body.ida, &body.regreso)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ida": ida, "regreso": regreso })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LinkBody {
    #[serde(rename = "idIda")]
    pub id_ida: Uuid,
    #[serde(rename = "idRegreso")]
    pub id_regreso: Uuid,
}

pub async fn link(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<LinkBody>,
) -> Result<StatusCode, AppError> {
    state
        .schedule
        .link_round_trip(&principal, body.id_ida, body.id_regreso)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unlink(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.schedule.unlink(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
