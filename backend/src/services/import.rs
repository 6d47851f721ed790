//! Batch importer
//!
//! Turns uploaded rows into movements. Inbound and outbound rows are grouped
//! by reference and each group is applied in its own unit of work, so one
//! bad invoice never blocks the others in the same upload.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use shared::{
    Actor, AuditAction, GroupedRow, ImportResult, InboundImportRow, InboundRequest, LineItem,
    Movement, NewProduct, OutboundImportRow, OutboundRequest, Product, ProductCategory,
    ProductId, ProductImportRow, StockKey, Warehouse, DEFAULT_MIN_STOCK,
};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::error::{AppError, AppResult};
use crate::services::audit;
use crate::services::movement::{MovementExecutor, MovementOrigin};
use crate::store::{Store, UnitOfWork};

/// Rows sharing one reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImportGroup<R> {
    pub reference: String,
    pub rows: Vec<R>,
}

/// Group rows by reference, keeping the order in which references first
/// appear. Rows with a blank reference share `placeholder`.
pub fn group_rows<R: GroupedRow>(rows: Vec<R>, placeholder: &str) -> Vec<ImportGroup<R>> {
    let mut groups: Vec<ImportGroup<R>> = Vec::new();

    for row in rows {
        let reference = match row.reference().map(str::trim) {
            Some(r) if !r.is_empty() => r.to_string(),
            _ => placeholder.to_string(),
        };

        match groups.iter_mut().find(|g| g.reference == reference) {
            Some(group) => group.rows.push(row),
            None => groups.push(ImportGroup {
                reference,
                rows: vec![row],
            }),
        }
    }

    groups
}

/// Reference shared by all unreferenced rows of one import run
pub fn placeholder_reference(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Decode a CSV upload with a header row into typed rows
pub fn decode_csv<T: DeserializeOwned>(bytes: &[u8]) -> AppResult<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .map_err(AppError::from)
}

/// Applies bulk uploads through the movement executor
#[derive(Clone)]
pub struct BatchImporter {
    store: Arc<dyn Store>,
    config: ImportConfig,
}

impl BatchImporter {
    pub fn new(store: Arc<dyn Store>, config: ImportConfig) -> Self {
        Self { store, config }
    }

    /// Receive one invoice per reference
    pub async fn import_inbound(&self, actor: Actor, rows: Vec<InboundImportRow>) -> ImportResult {
        let placeholder = placeholder_reference(&self.config.inbound_placeholder_prefix);
        let mut result = ImportResult::default();

        for group in group_rows(rows, &placeholder) {
            let outcome = match self.store.begin().await {
                Ok(mut uow) => {
                    let applied = self.inbound_group(uow.as_mut(), actor, &group).await;
                    settle(uow, applied).await
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(movement) => {
                    tracing::debug!("Imported invoice {} as movement {}", group.reference, movement.id);
                    result.record_success();
                }
                Err(err) => result.record_failure(failure_message("Invoice", &group.reference, &err)),
            }
        }

        tracing::info!(
            "Inbound import finished: {} succeeded, {} failed",
            result.success,
            result.failed
        );
        result
    }

    /// Ship one order per reference
    pub async fn import_outbound(&self, actor: Actor, rows: Vec<OutboundImportRow>) -> ImportResult {
        let placeholder = placeholder_reference(&self.config.outbound_placeholder_prefix);
        let mut result = ImportResult::default();

        for group in group_rows(rows, &placeholder) {
            let outcome = match self.store.begin().await {
                Ok(mut uow) => {
                    let applied = self.outbound_group(uow.as_mut(), actor, &group).await;
                    settle(uow, applied).await
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(movement) => {
                    tracing::debug!("Imported order {} as movement {}", group.reference, movement.id);
                    result.record_success();
                }
                Err(err) => result.record_failure(failure_message("Order", &group.reference, &err)),
            }
        }

        tracing::info!(
            "Outbound import finished: {} succeeded, {} failed",
            result.success,
            result.failed
        );
        result
    }

    /// Create products, one unit of work per row
    pub async fn import_products(&self, actor: Actor, rows: Vec<ProductImportRow>) -> ImportResult {
        let mut result = ImportResult::default();

        for row in rows {
            let sku = row.sku.trim().to_string();
            let outcome = match self.store.begin().await {
                Ok(mut uow) => {
                    let applied = self.product_row(uow.as_mut(), actor, row).await;
                    settle(uow, applied).await
                }
                Err(err) => Err(err),
            };

            match outcome {
                Ok(_) => result.record_success(),
                Err(err) => result.record_failure(failure_message("Product", &sku, &err)),
            }
        }

        tracing::info!(
            "Product import finished: {} succeeded, {} failed",
            result.success,
            result.failed
        );
        result
    }

    async fn inbound_group(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        group: &ImportGroup<InboundImportRow>,
    ) -> AppResult<Movement> {
        let first = first_row(group)?;
        let warehouse = resolve_warehouse(uow, &first.warehouse).await?;

        let supplier_name = first
            .supplier
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AppError::validation("supplier", "Supplier is required"))?;
        let supplier = uow
            .find_or_create_supplier(supplier_name, &self.config.supplier_placeholder_contact)
            .await?;

        let products = resolve_skus(uow, group.rows.iter().map(|r| r.sku.as_str())).await?;
        let items = group
            .rows
            .iter()
            .zip(&products)
            .map(|(row, product)| LineItem {
                product_id: product.id,
                quantity: row.quantity,
                unit_amount: row.cost,
            })
            .collect();

        let request = InboundRequest {
            warehouse_id: warehouse.id,
            supplier_id: Some(supplier.id),
            reference: group.reference.clone(),
            date: first.date,
            items,
        };
        let movement =
            MovementExecutor::apply_inbound(uow, actor, &request, MovementOrigin::Import).await?;

        if self.config.overwrite_product_cost {
            for (product_id, cost) in cost_updates(&group.rows, &products) {
                uow.set_product_cost(product_id, cost).await?;
            }
        }

        Ok(movement)
    }

    async fn outbound_group(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        group: &ImportGroup<OutboundImportRow>,
    ) -> AppResult<Movement> {
        let first = first_row(group)?;
        let warehouse = resolve_warehouse(uow, &first.warehouse).await?;

        let customer_name = first
            .customer
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.config.walk_in_customer_name.as_str());
        let customer = uow
            .find_or_create_customer(customer_name, &self.config.customer_placeholder_contact)
            .await?;

        let products = resolve_skus(uow, group.rows.iter().map(|r| r.sku.as_str())).await?;
        let items = group
            .rows
            .iter()
            .zip(&products)
            .map(|(row, product)| LineItem {
                product_id: product.id,
                quantity: row.quantity,
                unit_amount: row.price,
            })
            .collect();

        let request = OutboundRequest {
            warehouse_id: warehouse.id,
            customer_id: Some(customer.id),
            reference: group.reference.clone(),
            date: first.date,
            document_url: None,
            items,
        };

        MovementExecutor::apply_outbound(uow, actor, &request, MovementOrigin::Import).await
    }

    async fn product_row(
        &self,
        uow: &mut dyn UnitOfWork,
        actor: Actor,
        row: ProductImportRow,
    ) -> AppResult<Product> {
        let sku = row.sku.trim();
        if sku.is_empty() {
            return Err(AppError::validation("sku", "SKU is required"));
        }
        let name = row.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("name", "Name is required"));
        }
        let cost_price = row.cost_price.unwrap_or(Decimal::ZERO);
        if row.price < Decimal::ZERO || cost_price < Decimal::ZERO {
            return Err(AppError::validation("price", "Prices cannot be negative"));
        }
        let opening = row.stock_level.unwrap_or(0);
        if opening < 0 {
            return Err(AppError::validation("stock_level", "Stock level cannot be negative"));
        }

        let product = uow
            .create_product(NewProduct {
                sku: sku.to_string(),
                name: name.to_string(),
                category: ProductCategory::match_name(row.category.as_deref().unwrap_or_default()),
                price: row.price,
                cost_price,
                min_stock: row.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            })
            .await?;

        if opening > 0 {
            let warehouse = uow
                .ensure_warehouse(
                    &self.config.default_warehouse_name,
                    &self.config.default_warehouse_location,
                )
                .await?;
            uow.increment(StockKey::new(product.id, warehouse.id), opening)
                .await?;
        }

        audit::record(
            uow,
            actor,
            AuditAction::BulkImport,
            "Product",
            product.id,
            format!("Imported {} into {}", product.sku, product.category),
        )
        .await?;

        Ok(product)
    }
}

fn first_row<R>(group: &ImportGroup<R>) -> AppResult<&R> {
    group
        .rows
        .first()
        .ok_or_else(|| AppError::validation("rows", "Group has no rows"))
}

async fn resolve_warehouse(uow: &mut dyn UnitOfWork, name: &str) -> AppResult<Warehouse> {
    uow.warehouse_by_name(name)
        .await?
        .ok_or_else(|| AppError::ReferenceResolution(format!("Warehouse '{}' not found", name)))
}

/// Products for each SKU, in the given order. Unknown SKUs fail the whole group.
async fn resolve_skus<'a>(
    uow: &mut dyn UnitOfWork,
    skus: impl Iterator<Item = &'a str>,
) -> AppResult<Vec<Product>> {
    let mut products = Vec::new();
    let mut missing: Vec<&str> = Vec::new();

    for sku in skus {
        match uow.product_by_sku(sku).await? {
            Some(product) => products.push(product),
            None if !missing.contains(&sku) => missing.push(sku),
            None => {}
        }
    }

    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(|s| format!("'{}'", s)).collect();
        return Err(AppError::ReferenceResolution(format!(
            "SKU {} not found",
            names.join(", ")
        )));
    }

    Ok(products)
}

/// Commit on success, roll back otherwise
async fn settle<T>(uow: Box<dyn UnitOfWork>, applied: AppResult<T>) -> AppResult<T> {
    match applied {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

fn failure_message(label: &str, reference: &str, err: &AppError) -> String {
    if err.is_persistence() {
        tracing::error!("{} {} failed in storage: {:?}", label, reference, err);
        return format!("{} {}: Storage failure, nothing was recorded", label, reference);
    }
    tracing::warn!("{} {} rejected: {}", label, reference, err);
    format!("{} {}: {}", label, reference, err)
}

/// Positive row costs keyed by product, in ascending id order so product rows
/// are locked in the same order as stock counters. The last row for a product
/// wins.
fn cost_updates(rows: &[InboundImportRow], products: &[Product]) -> BTreeMap<ProductId, Decimal> {
    rows.iter()
        .zip(products)
        .filter_map(|(row, product)| {
            row.cost
                .filter(|c| *c > Decimal::ZERO)
                .map(|cost| (product.id, cost))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(reference: Option<&str>, sku: &str) -> InboundImportRow {
        InboundImportRow {
            reference: reference.map(str::to_string),
            warehouse: "Main".to_string(),
            supplier: Some("Acme".to_string()),
            date: None,
            sku: sku.to_string(),
            quantity: 1,
            cost: None,
        }
    }

    fn product(id: ProductId) -> Product {
        Product {
            id,
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            category: ProductCategory::General,
            price: Decimal::ONE,
            cost_price: Decimal::ONE,
            min_stock: DEFAULT_MIN_STOCK,
            is_archived: false,
        }
    }

    #[test]
    fn test_cost_updates_follow_product_id_order() {
        let costed = |sku: &str, cost: i64| InboundImportRow {
            cost: Some(Decimal::new(cost, 2)),
            ..row(Some("INV-1"), sku)
        };
        let rows = vec![costed("C", 300), costed("A", 100), row(Some("INV-1"), "B"), costed("C", 350)];
        let products = vec![product(9), product(2), product(5), product(9)];

        let updates: Vec<(ProductId, Decimal)> = cost_updates(&rows, &products).into_iter().collect();

        assert_eq!(
            updates,
            vec![(2, Decimal::new(100, 2)), (9, Decimal::new(350, 2))]
        );
    }

    #[test]
    fn test_group_rows_keeps_first_seen_order() {
        let rows = vec![
            row(Some("INV-2"), "A"),
            row(Some("INV-1"), "B"),
            row(Some("INV-2"), "C"),
        ];
        let groups = group_rows(rows, "BULK-IMPORT-x");
        let refs: Vec<&str> = groups.iter().map(|g| g.reference.as_str()).collect();
        assert_eq!(refs, vec!["INV-2", "INV-1"]);
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[0].rows[1].sku, "C");
    }

    #[test]
    fn test_blank_references_share_one_placeholder() {
        let rows = vec![row(None, "A"), row(Some("  "), "B"), row(Some("INV-1"), "C")];
        let groups = group_rows(rows, "BULK-IMPORT-abc");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].reference, "BULK-IMPORT-abc");
        assert_eq!(groups[0].rows.len(), 2);
    }

    #[test]
    fn test_placeholder_reference_is_unique_per_run() {
        let a = placeholder_reference("BULK-OUT");
        let b = placeholder_reference("BULK-OUT");
        assert!(a.starts_with("BULK-OUT-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_csv_reads_optional_columns() {
        let csv = "reference,warehouse,supplier,date,sku,quantity,cost\n\
                   INV-9, Main ,Acme,2024-03-01,WID-1,5,2.50\n\
                   ,Main,,,WID-2,3,\n";
        let rows: Vec<InboundImportRow> = decode_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].warehouse, "Main");
        assert_eq!(rows[0].cost, Some(Decimal::new(250, 2)));
        assert_eq!(rows[1].reference, None);
        assert_eq!(rows[1].cost, None);
    }

    #[test]
    fn test_decode_csv_rejects_bad_quantity() {
        let csv = "reference,warehouse,supplier,date,sku,quantity,cost\nINV-1,Main,Acme,,WID-1,lots,\n";
        let err = decode_csv::<InboundImportRow>(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_failure_message_hides_storage_details() {
        let msg = failure_message("Order", "SO-1", &AppError::Storage("socket closed".to_string()));
        assert_eq!(msg, "Order SO-1: Storage failure, nothing was recorded");

        let msg = failure_message(
            "Invoice",
            "INV-2",
            &AppError::ReferenceResolution("SKU 'NOPE' not found".to_string()),
        );
        assert_eq!(msg, "Invoice INV-2: SKU 'NOPE' not found");
    }
}
