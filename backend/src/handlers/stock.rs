//! HTTP handlers for stock level reads

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use shared::{ProductId, StockLevel, WarehouseId};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::StockService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StockQuery {
    pub warehouse_id: WarehouseId,
    pub product_id: Option<ProductId>,
}

/// Stock held by a warehouse, or one product's level when `product_id` is given
pub async fn get_stock(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<StockQuery>,
) -> AppResult<Json<Vec<StockLevel>>> {
    let service = StockService::new(state.store);
    let levels = match query.product_id {
        Some(product_id) => vec![service.level(product_id, query.warehouse_id).await?],
        None => service.list_warehouse(query.warehouse_id).await?,
    };
    Ok(Json(levels))
}
