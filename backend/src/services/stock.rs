//! Read access to committed stock levels

use std::sync::Arc;

use shared::{ProductId, StockKey, StockLevel, WarehouseId};

use crate::error::AppResult;
use crate::store::Store;

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn Store>,
}

impl StockService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Quantity of one product in one warehouse. Missing counters read as 0.
    pub async fn level(&self, product_id: ProductId, warehouse_id: WarehouseId) -> AppResult<StockLevel> {
        let quantity = self
            .store
            .stock_level(StockKey::new(product_id, warehouse_id))
            .await?;

        Ok(StockLevel {
            product_id,
            warehouse_id,
            quantity,
        })
    }

    pub async fn list_warehouse(&self, warehouse_id: WarehouseId) -> AppResult<Vec<StockLevel>> {
        self.store.stock_in_warehouse(warehouse_id).await
    }
}
