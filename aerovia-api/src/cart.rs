use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use aerovia_cart::Cart;
use aerovia_core::Principal;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    #[serde(default)]
    pub sync_paired: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddItemBody {
    #[serde(rename = "idVuelo")]
    pub id_vuelo: Uuid,
    #[serde(rename = "idClase")]
    pub id_clase: i32,
    #[serde(default)]
    pub cantidad: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct QuantityBody {
    pub cantidad: i32,
}

pub async fn get_cart(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Cart>, AppError> {
    let cart = state.carts.get_cart(principal.subject_id).await?;
    Ok(Json(cart))
}

pub async fn add_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<AddItemBody>,
) -> Result<StatusCode, AppError> {
    state
        .carts
        .add_or_increment(
            principal.subject_id,
            body.id_vuelo,
            body.id_clase,
            body.cantidad.unwrap_or(1),
            query.sync_paired,
        )
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn update_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<QuantityBody>,
) -> Result<StatusCode, AppError> {
    state
        .carts
        .update_quantity(principal.subject_id, item_id, body.cantidad, query.sync_paired)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_item(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<SyncQuery>,
) -> Result<StatusCode, AppError> {
    state
        .carts
        .remove_item(principal.subject_id, item_id, query.sync_paired)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
