//! HTTP handlers for the audit trail

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{AuditEntry, Pagination};

use crate::error::AppResult;
use crate::middleware::{require_stock_manager, CurrentUser};
use crate::services::AuditService;
use crate::AppState;

/// Newest audit entries first
pub async fn list_audit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<Vec<AuditEntry>>> {
    require_stock_manager(&current_user.0)?;

    let service = AuditService::new(state.store);
    Ok(Json(service.recent(&pagination).await?))
}
