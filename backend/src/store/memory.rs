use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    AuditEntry, Customer, Movement, NewAuditEntry, NewMovement, NewProduct, Product, ProductId,
    StockKey, StockLevel, Supplier, TransferRecord, Warehouse, WarehouseId,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{AuditLog, Catalog, MovementLog, StockLedger, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct Sequences {
    product: i64,
    warehouse: i64,
    supplier: i64,
    customer: i64,
    movement: i64,
    transfer: i64,
    audit: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    seq: Sequences,
    products: BTreeMap<ProductId, Product>,
    warehouses: BTreeMap<WarehouseId, Warehouse>,
    suppliers: BTreeMap<i64, Supplier>,
    customers: BTreeMap<i64, Customer>,
    stock: BTreeMap<StockKey, i64>,
    movements: Vec<Movement>,
    transfers: Vec<TransferRecord>,
    audit: Vec<AuditEntry>,
}

impl MemoryState {
    fn quantity(&self, key: StockKey) -> i64 {
        self.stock.get(&key).copied().unwrap_or(0)
    }

    fn insert_product(&mut self, product: NewProduct) -> AppResult<Product> {
        if self.products.values().any(|p| p.sku == product.sku) {
            return Err(AppError::validation(
                "sku",
                format!("SKU '{}' already exists", product.sku),
            ));
        }
        let product = Product {
            id: next(&mut self.seq.product),
            sku: product.sku,
            name: product.name,
            category: product.category,
            price: product.price,
            cost_price: product.cost_price,
            min_stock: product.min_stock,
            is_archived: false,
        };
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    fn warehouse_named(&self, name: &str) -> Option<Warehouse> {
        let wanted = name.trim().to_lowercase();
        self.warehouses
            .values()
            .find(|w| w.name.to_lowercase() == wanted)
            .cloned()
    }

    fn insert_warehouse(&mut self, name: &str, location: &str) -> Warehouse {
        let warehouse = Warehouse {
            id: next(&mut self.seq.warehouse),
            name: name.to_string(),
            location: location.to_string(),
        };
        self.warehouses.insert(warehouse.id, warehouse.clone());
        warehouse
    }
}

/// In-process store for development and tests.
///
/// A unit of work holds the store's lock from `begin` until it commits or
/// is dropped, and stages its writes on a private copy of the state. Units
/// are therefore executed one at a time, which trivially serializes every
/// stock key.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_audit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a storage outage on every audit append until switched off
    pub fn fail_audit_appends(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub async fn seed_product(&self, product: NewProduct) -> AppResult<Product> {
        self.state.lock().await.insert_product(product)
    }

    pub async fn seed_warehouse(&self, name: &str, location: &str) -> Warehouse {
        self.state.lock().await.insert_warehouse(name, location)
    }

    pub async fn seed_supplier(&self, name: &str, contact: &str) -> Supplier {
        let mut state = self.state.lock().await;
        let supplier = Supplier {
            id: next(&mut state.seq.supplier),
            name: name.to_string(),
            contact: contact.to_string(),
        };
        state.suppliers.insert(supplier.id, supplier.clone());
        supplier
    }

    pub async fn seed_customer(&self, name: &str, contact: &str) -> Customer {
        let mut state = self.state.lock().await;
        let customer = Customer {
            id: next(&mut state.seq.customer),
            name: name.to_string(),
            contact: contact.to_string(),
        };
        state.customers.insert(customer.id, customer.clone());
        customer
    }

    /// Overwrite a counter directly, bypassing movements and audit
    pub async fn seed_stock(&self, key: StockKey, quantity: i64) {
        self.state.lock().await.stock.insert(key, quantity);
    }

    pub async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.lock().await.products.get(&id).cloned()
    }

    pub async fn suppliers(&self) -> Vec<Supplier> {
        self.state.lock().await.suppliers.values().cloned().collect()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.state.lock().await.customers.values().cloned().collect()
    }

    pub async fn movements(&self) -> Vec<Movement> {
        self.state.lock().await.movements.clone()
    }

    pub async fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().await.transfers.clone()
    }

    /// Audit entries in insertion order
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            working,
            fail_audit: self.fail_audit.load(Ordering::SeqCst),
        }))
    }

    async fn stock_level(&self, key: StockKey) -> AppResult<i64> {
        Ok(self.state.lock().await.quantity(key))
    }

    async fn stock_in_warehouse(&self, warehouse_id: WarehouseId) -> AppResult<Vec<StockLevel>> {
        let state = self.state.lock().await;
        Ok(state
            .stock
            .iter()
            .filter(|(key, _)| key.warehouse_id == warehouse_id)
            .map(|(key, quantity)| StockLevel {
                product_id: key.product_id,
                warehouse_id: key.warehouse_id,
                quantity: *quantity,
            })
            .collect())
    }

    async fn recent_audit(&self, limit: i64, offset: i64) -> AppResult<Vec<AuditEntry>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let offset = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .audit
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn movement(&self, id: i64) -> AppResult<Movement> {
        self.state
            .lock()
            .await
            .movements
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Unit of work over [`MemoryStore`]
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    fail_audit: bool,
}

#[async_trait]
impl StockLedger for MemoryUnitOfWork {
    async fn lock_stock(&mut self, key: StockKey) -> AppResult<i64> {
        Ok(self.working.quantity(key))
    }

    async fn increment(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        let quantity = self
            .working
            .quantity(key)
            .checked_add(delta)
            .ok_or_else(|| {
                AppError::Storage(format!(
                    "Stock counter overflow for product #{} at warehouse #{}",
                    key.product_id, key.warehouse_id
                ))
            })?;
        self.working.stock.insert(key, quantity);
        Ok(quantity)
    }

    async fn decrement(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        let available = self.working.quantity(key);
        if available < delta {
            return Err(AppError::InsufficientStock {
                product_id: key.product_id,
                sku: None,
                available,
                requested: delta,
            });
        }
        self.working.stock.insert(key, available - delta);
        Ok(available - delta)
    }
}

#[async_trait]
impl Catalog for MemoryUnitOfWork {
    async fn product_by_id(&mut self, id: ProductId) -> AppResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>> {
        Ok(self
            .working
            .products
            .values()
            .find(|p| p.sku == sku)
            .cloned())
    }

    async fn create_product(&mut self, product: NewProduct) -> AppResult<Product> {
        self.working.insert_product(product)
    }

    async fn set_product_cost(&mut self, id: ProductId, cost_price: Decimal) -> AppResult<()> {
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        product.cost_price = cost_price;
        Ok(())
    }

    async fn warehouse_by_id(&mut self, id: WarehouseId) -> AppResult<Option<Warehouse>> {
        Ok(self.working.warehouses.get(&id).cloned())
    }

    async fn warehouse_by_name(&mut self, name: &str) -> AppResult<Option<Warehouse>> {
        Ok(self.working.warehouse_named(name))
    }

    async fn ensure_warehouse(&mut self, name: &str, location: &str) -> AppResult<Warehouse> {
        match self.working.warehouse_named(name) {
            Some(warehouse) => Ok(warehouse),
            None => Ok(self.working.insert_warehouse(name, location)),
        }
    }

    async fn supplier_by_id(&mut self, id: i64) -> AppResult<Option<Supplier>> {
        Ok(self.working.suppliers.get(&id).cloned())
    }

    async fn find_or_create_supplier(&mut self, name: &str, contact: &str) -> AppResult<Supplier> {
        let wanted = name.trim().to_lowercase();
        if let Some(found) = self
            .working
            .suppliers
            .values()
            .find(|s| s.name.to_lowercase() == wanted)
        {
            return Ok(found.clone());
        }
        let supplier = Supplier {
            id: next(&mut self.working.seq.supplier),
            name: name.trim().to_string(),
            contact: contact.to_string(),
        };
        self.working.suppliers.insert(supplier.id, supplier.clone());
        Ok(supplier)
    }

    async fn customer_by_id(&mut self, id: i64) -> AppResult<Option<Customer>> {
        Ok(self.working.customers.get(&id).cloned())
    }

    async fn find_or_create_customer(&mut self, name: &str, contact: &str) -> AppResult<Customer> {
        let wanted = name.trim().to_lowercase();
        if let Some(found) = self
            .working
            .customers
            .values()
            .find(|c| c.name.to_lowercase() == wanted)
        {
            return Ok(found.clone());
        }
        let customer = Customer {
            id: next(&mut self.working.seq.customer),
            name: name.trim().to_string(),
            contact: contact.to_string(),
        };
        self.working.customers.insert(customer.id, customer.clone());
        Ok(customer)
    }
}

#[async_trait]
impl MovementLog for MemoryUnitOfWork {
    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement> {
        let movement = Movement {
            id: next(&mut self.working.seq.movement),
            reference: movement.reference,
            direction: movement.direction,
            counterparty_id: movement.counterparty_id,
            warehouse_id: movement.warehouse_id,
            movement_date: movement.movement_date,
            document_url: movement.document_url,
            lines: movement.lines,
            created_at: Utc::now(),
        };
        self.working.movements.push(movement.clone());
        Ok(movement)
    }

    async fn insert_transfer(
        &mut self,
        product_id: ProductId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: i64,
    ) -> AppResult<TransferRecord> {
        let transfer = TransferRecord {
            id: next(&mut self.working.seq.transfer),
            product_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
            created_at: Utc::now(),
        };
        self.working.transfers.push(transfer.clone());
        Ok(transfer)
    }
}

#[async_trait]
impl AuditLog for MemoryUnitOfWork {
    async fn append_audit(&mut self, entry: NewAuditEntry) -> AppResult<AuditEntry> {
        if self.fail_audit {
            return Err(AppError::Storage("audit log unavailable".to_string()));
        }
        let entry = AuditEntry {
            id: next(&mut self.working.seq.audit),
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            created_at: Utc::now(),
        };
        self.working.audit.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
