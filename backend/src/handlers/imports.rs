//! HTTP handlers for bulk uploads
//!
//! Uploads are accepted either as a JSON array of rows or as a CSV file
//! (`Content-Type: text/csv`) with a header row.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::de::DeserializeOwned;
use shared::{ImportResult, InboundImportRow, OutboundImportRow, ProductImportRow};

use crate::error::{AppError, AppResult};
use crate::middleware::{require_stock_manager, CurrentUser};
use crate::services::{decode_csv, BatchImporter};
use crate::AppState;

/// Rows of an upload, decoded from JSON or CSV
#[derive(Debug)]
pub struct ImportRows<T>(pub Vec<T>);

#[async_trait]
impl<S, T> FromRequest<S> for ImportRows<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_csv = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/csv"))
            .unwrap_or(false);

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::validation("file", e.body_text()))?;

        if is_csv {
            return decode_csv(&body).map(ImportRows);
        }

        serde_json::from_slice::<Vec<T>>(&body)
            .map(ImportRows)
            .map_err(|e| AppError::validation("rows", format!("Input must be an array of rows: {}", e)))
    }
}

/// Bulk inbound upload, one invoice per reference
pub async fn import_inbound(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ImportRows(rows): ImportRows<InboundImportRow>,
) -> AppResult<Json<ImportResult>> {
    require_stock_manager(&current_user.0)?;

    let importer = BatchImporter::new(state.store, state.config.import.clone());
    Ok(Json(importer.import_inbound(current_user.0.actor(), rows).await))
}

/// Bulk outbound upload, one order per reference
pub async fn import_outbound(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ImportRows(rows): ImportRows<OutboundImportRow>,
) -> AppResult<Json<ImportResult>> {
    require_stock_manager(&current_user.0)?;

    let importer = BatchImporter::new(state.store, state.config.import.clone());
    Ok(Json(importer.import_outbound(current_user.0.actor(), rows).await))
}

/// Bulk product upload with optional opening stock
pub async fn import_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    ImportRows(rows): ImportRows<ProductImportRow>,
) -> AppResult<Json<ImportResult>> {
    require_stock_manager(&current_user.0)?;

    let importer = BatchImporter::new(state.store, state.config.import.clone());
    Ok(Json(importer.import_products(current_user.0.actor(), rows).await))
}
