//! Movement executor
//!
//! Applies inbound receipts, outbound shipments and transfers atomically.
//! Each call runs inside one unit of work: the stock changes, the movement
//! record and its audit entry are committed together or not at all.
//!
//! Stock keys are always touched in ascending `(product_id, warehouse_id)`
//! order so that two units contending for the same keys cannot deadlock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    requested_totals, validate_inbound, validate_lines, validate_outbound, validate_transfer,
    validate_transfer_shape, Actor, AuditAction, Direction, InboundRequest, LineItem, Movement,
    MovementLine, MovementOutcome, MovementRequest, NewMovement, OutboundRequest, Product,
    ProductId, StockKey, TransferRecord, TransferRequest, WarehouseId,
};

use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::store::{Store, UnitOfWork};

/// Where a movement originated, which decides how it is audited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementOrigin {
    /// A single API call
    Direct,
    /// One group of a bulk import
    Import,
}

/// Executes stock movements against a [`Store`]
#[derive(Clone)]
pub struct MovementExecutor {
    store: Arc<dyn Store>,
}

impl MovementExecutor {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and apply one movement in its own unit of work.
    ///
    /// Calls are not idempotent: submitting the same request twice applies
    /// it twice.
    pub async fn execute(&self, actor: Actor, request: MovementRequest) -> AppResult<MovementOutcome> {
        check_shape(&request)?;

        let mut uow = self.store.begin().await?;
        let result = Self::apply(uow.as_mut(), actor, &request, MovementOrigin::Direct).await;

        match result {
            Ok(outcome) => {
                uow.commit().await?;
                tracing::info!(
                    kind = request.kind(),
                    id = outcome.id(),
                    user_id = ?actor.user_id,
                    "Movement committed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    tracing::warn!("Rollback failed after {}: {}", request.kind(), rollback_err);
                }
                tracing::warn!(kind = request.kind(), "Movement rejected: {}", err);
                Err(err)
            }
        }
    }

    /// Apply a movement inside a caller-owned unit of work
    pub async fn apply(
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        request: &MovementRequest,
        origin: MovementOrigin,
    ) -> AppResult<MovementOutcome> {
        match request {
            MovementRequest::Inbound(req) => Self::apply_inbound(uow, actor, req, origin)
                .await
                .map(MovementOutcome::Movement),
            MovementRequest::Outbound(req) => Self::apply_outbound(uow, actor, req, origin)
                .await
                .map(MovementOutcome::Movement),
            MovementRequest::Transfer(req) => Self::apply_transfer(uow, actor, req)
                .await
                .map(MovementOutcome::Transfer),
        }
    }

    /// Receive goods: one movement with its lines, then increment every
    /// touched counter
    pub async fn apply_inbound(
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        request: &InboundRequest,
        origin: MovementOrigin,
    ) -> AppResult<Movement> {
        require_reference(&request.reference)?;
        require_warehouse(uow, request.warehouse_id).await?;
        if let Some(supplier_id) = request.supplier_id {
            uow.supplier_by_id(supplier_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Supplier #{}", supplier_id)))?;
        }

        let products = load_products(uow, &request.items).await?;
        validate_inbound(request, |id| products.contains_key(&id))?;
        let totals = sorted_totals(&request.items)?;

        let lines = request
            .items
            .iter()
            .map(|item| MovementLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_amount: item.unit_amount.unwrap_or(Decimal::ZERO),
            })
            .collect();

        let movement = uow
            .insert_movement(NewMovement {
                reference: request.reference.clone(),
                direction: Direction::In,
                counterparty_id: request.supplier_id,
                warehouse_id: request.warehouse_id,
                movement_date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
                document_url: None,
                lines,
            })
            .await?;

        for (product_id, total) in totals {
            uow.increment(StockKey::new(product_id, request.warehouse_id), total)
                .await?;
        }

        let (action, details) = match origin {
            MovementOrigin::Direct => (
                AuditAction::Inbound,
                format!(
                    "Received {} items (Ref: {})",
                    movement.lines.len(),
                    movement.reference
                ),
            ),
            MovementOrigin::Import => (
                AuditAction::BulkInbound,
                format!(
                    "Bulk imported invoice {} ({} items)",
                    movement.reference,
                    movement.lines.len()
                ),
            ),
        };
        audit::record(uow, actor, action, "Inbound", movement.id, details).await?;

        tracing::debug!(
            movement_id = movement.id,
            warehouse_id = movement.warehouse_id,
            units = movement.total_quantity(),
            "Inbound applied"
        );

        Ok(movement)
    }

    /// Ship goods: lock the touched counters, re-check availability under
    /// the lock, then decrement
    pub async fn apply_outbound(
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        request: &OutboundRequest,
        origin: MovementOrigin,
    ) -> AppResult<Movement> {
        require_reference(&request.reference)?;
        require_warehouse(uow, request.warehouse_id).await?;
        if let Some(customer_id) = request.customer_id {
            uow.customer_by_id(customer_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Customer #{}", customer_id)))?;
        }

        let products = load_products(uow, &request.items).await?;
        validate_lines(&request.items, |id| products.contains_key(&id))?;

        let totals = sorted_totals(&request.items)?;
        let mut available: HashMap<ProductId, i64> = HashMap::with_capacity(totals.len());
        for (product_id, _) in &totals {
            let quantity = uow
                .lock_stock(StockKey::new(*product_id, request.warehouse_id))
                .await?;
            available.insert(*product_id, quantity);
        }

        validate_outbound(
            request,
            |id| products.contains_key(&id),
            |id| available.get(&id).copied().unwrap_or(0),
        )
        .map_err(|rejection| AppError::from(rejection).with_sku(|id| sku_of(&products, id)))?;

        for (product_id, total) in totals {
            uow.decrement(StockKey::new(product_id, request.warehouse_id), total)
                .await
                .map_err(|err| err.with_sku(|id| sku_of(&products, id)))?;
        }

        let lines = request
            .items
            .iter()
            .map(|item| MovementLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_amount: line_price(item, products.get(&item.product_id)),
            })
            .collect();

        let movement = uow
            .insert_movement(NewMovement {
                reference: request.reference.clone(),
                direction: Direction::Out,
                counterparty_id: request.customer_id,
                warehouse_id: request.warehouse_id,
                movement_date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
                document_url: request.document_url.clone(),
                lines,
            })
            .await?;

        let (action, details) = match origin {
            MovementOrigin::Direct => (
                AuditAction::OutboundShipped,
                format!(
                    "Shipped {} items (Ref: {})",
                    movement.lines.len(),
                    movement.reference
                ),
            ),
            MovementOrigin::Import => (
                AuditAction::BulkOutbound,
                format!(
                    "Bulk imported order {} ({} items)",
                    movement.reference,
                    movement.lines.len()
                ),
            ),
        };
        audit::record(uow, actor, action, "Outbound", movement.id, details).await?;

        tracing::debug!(
            movement_id = movement.id,
            warehouse_id = movement.warehouse_id,
            units = movement.total_quantity(),
            "Outbound applied"
        );

        Ok(movement)
    }

    /// Move stock between two warehouses
    pub async fn apply_transfer(
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        request: &TransferRequest,
    ) -> AppResult<TransferRecord> {
        validate_transfer_shape(request)?;

        let product = uow
            .product_by_id(request.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Product #{}", request.product_id)))?;
        require_warehouse(uow, request.from_warehouse_id).await?;
        require_warehouse(uow, request.to_warehouse_id).await?;

        let source = StockKey::new(request.product_id, request.from_warehouse_id);
        let destination = StockKey::new(request.product_id, request.to_warehouse_id);

        let mut keys = [source, destination];
        keys.sort();
        let mut source_available = 0;
        for key in keys {
            let quantity = uow.lock_stock(key).await?;
            if key == source {
                source_available = quantity;
            }
        }

        let attach_sku = |err: AppError| err.with_sku(|_| Some(product.sku.clone()));
        validate_transfer(request, source_available).map_err(|r| attach_sku(r.into()))?;

        uow.decrement(source, request.quantity)
            .await
            .map_err(attach_sku)?;
        uow.increment(destination, request.quantity).await?;

        let transfer = uow
            .insert_transfer(
                request.product_id,
                request.from_warehouse_id,
                request.to_warehouse_id,
                request.quantity,
            )
            .await?;

        audit::record(
            uow,
            actor,
            AuditAction::Transfer,
            "Inventory",
            transfer.id,
            format!(
                "Moved {} units of {} from WH #{} to WH #{}",
                transfer.quantity, product.sku, transfer.from_warehouse_id, transfer.to_warehouse_id
            ),
        )
        .await?;

        tracing::debug!(
            transfer_id = transfer.id,
            product_id = transfer.product_id,
            "Transfer applied"
        );

        Ok(transfer)
    }
}

/// Checks that need no storage access, run before a unit is opened
fn check_shape(request: &MovementRequest) -> AppResult<()> {
    match request {
        MovementRequest::Inbound(req) => {
            require_reference(&req.reference)?;
            validate_inbound(req, |_| true)?;
        }
        MovementRequest::Outbound(req) => {
            require_reference(&req.reference)?;
            validate_lines(&req.items, |_| true)?;
        }
        MovementRequest::Transfer(req) => validate_transfer_shape(req)?,
    }
    Ok(())
}

fn require_reference(reference: &str) -> AppResult<()> {
    if reference.trim().is_empty() {
        return Err(AppError::validation("reference", "Reference is required"));
    }
    Ok(())
}

async fn require_warehouse(uow: &mut dyn UnitOfWork, id: WarehouseId) -> AppResult<()> {
    uow.warehouse_by_id(id)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Warehouse #{}", id)))
}

/// Every distinct product the lines name that exists in the catalog
async fn load_products(
    uow: &mut dyn UnitOfWork,
    items: &[LineItem],
) -> AppResult<HashMap<ProductId, Product>> {
    let mut products = HashMap::new();
    for item in items {
        if products.contains_key(&item.product_id) {
            continue;
        }
        if let Some(product) = uow.product_by_id(item.product_id).await? {
            products.insert(item.product_id, product);
        }
    }
    Ok(products)
}

/// Per-product totals in lock order
fn sorted_totals(items: &[LineItem]) -> AppResult<Vec<(ProductId, i64)>> {
    let mut totals = requested_totals(items)?;
    totals.sort_by_key(|(product_id, _)| *product_id);
    Ok(totals)
}

fn sku_of(products: &HashMap<ProductId, Product>, id: ProductId) -> Option<String> {
    products.get(&id).map(|p| p.sku.clone())
}

/// A positive price on the line wins, otherwise the product's list price
fn line_price(item: &LineItem, product: Option<&Product>) -> Decimal {
    match item.unit_amount {
        Some(amount) if amount > Decimal::ZERO => amount,
        _ => product.map(|p| p.price).unwrap_or(Decimal::ZERO),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ProductCategory;

    fn product(price: Decimal) -> Product {
        Product {
            id: 1,
            sku: "WID-1".to_string(),
            name: "Widget".to_string(),
            category: ProductCategory::General,
            price,
            cost_price: Decimal::ZERO,
            min_stock: 10,
            is_archived: false,
        }
    }

    #[test]
    fn test_sorted_totals_merges_and_orders_by_product() {
        let items = vec![LineItem::new(9, 2), LineItem::new(3, 1), LineItem::new(9, 5)];
        assert_eq!(sorted_totals(&items).unwrap(), vec![(3, 1), (9, 7)]);
    }

    #[test]
    fn test_line_price_falls_back_to_list_price() {
        let widget = product(Decimal::new(1250, 2));

        let priced = LineItem::new(1, 1).with_unit_amount(Decimal::new(999, 2));
        assert_eq!(line_price(&priced, Some(&widget)), Decimal::new(999, 2));

        let zero = LineItem::new(1, 1).with_unit_amount(Decimal::ZERO);
        assert_eq!(line_price(&zero, Some(&widget)), Decimal::new(1250, 2));

        assert_eq!(line_price(&LineItem::new(1, 1), Some(&widget)), Decimal::new(1250, 2));
    }

    #[test]
    fn test_shape_check_rejects_blank_reference_and_same_warehouse() {
        let inbound = MovementRequest::Inbound(InboundRequest {
            warehouse_id: 1,
            supplier_id: None,
            reference: "  ".to_string(),
            date: None,
            items: vec![LineItem::new(1, 5)],
        });
        assert!(matches!(check_shape(&inbound), Err(AppError::Validation { .. })));

        let transfer = MovementRequest::Transfer(TransferRequest {
            product_id: 1,
            from_warehouse_id: 2,
            to_warehouse_id: 2,
            quantity: 5,
        });
        assert!(matches!(check_shape(&transfer), Err(AppError::Validation { .. })));
    }
}
