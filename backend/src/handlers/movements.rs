//! HTTP handlers for stock movements

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{InboundRequest, Movement, MovementOutcome, MovementRequest, OutboundRequest, TransferRequest};

use crate::error::AppResult;
use crate::middleware::{require_stock_manager, CurrentUser};
use crate::services::MovementExecutor;
use crate::AppState;

/// Receive goods into a warehouse
pub async fn record_inbound(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<InboundRequest>,
) -> AppResult<(StatusCode, Json<MovementOutcome>)> {
    let executor = MovementExecutor::new(state.store);
    let outcome = executor
        .execute(current_user.0.actor(), MovementRequest::Inbound(input))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Ship goods out of a warehouse
pub async fn record_outbound(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<OutboundRequest>,
) -> AppResult<(StatusCode, Json<MovementOutcome>)> {
    let executor = MovementExecutor::new(state.store);
    let outcome = executor
        .execute(current_user.0.actor(), MovementRequest::Outbound(input))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Move stock between warehouses (admin or manager)
pub async fn record_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<TransferRequest>,
) -> AppResult<(StatusCode, Json<MovementOutcome>)> {
    require_stock_manager(&current_user.0)?;

    let executor = MovementExecutor::new(state.store);
    let outcome = executor
        .execute(current_user.0.actor(), MovementRequest::Transfer(input))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Get a stored inbound or outbound movement
pub async fn get_movement(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(movement_id): Path<i64>,
) -> AppResult<Json<Movement>> {
    let movement = state.store.movement(movement_id).await?;
    Ok(Json(movement))
}
