//! Storage seam for the movement engine
//!
//! A [`Store`] is a long-lived, shareable handle. Every state change goes
//! through a [`UnitOfWork`] opened with [`Store::begin`]: all stock
//! mutations, movement records and audit entries written through one unit
//! become visible together on [`UnitOfWork::commit`], or not at all.
//! Dropping a unit without committing discards its writes.

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryUnitOfWork};
pub use postgres::{PgStore, PgUnitOfWork};

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    AuditEntry, Customer, Movement, NewAuditEntry, NewMovement, NewProduct, Product, ProductId,
    StockKey, StockLevel, Supplier, TransferRecord, Warehouse, WarehouseId,
};

use crate::error::AppResult;

/// Shared handle to the persisted inventory state
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new atomic unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    /// Committed quantity for a key, 0 when no counter exists yet
    async fn stock_level(&self, key: StockKey) -> AppResult<i64>;

    /// All counters held by one warehouse, ordered by product id
    async fn stock_in_warehouse(&self, warehouse_id: WarehouseId) -> AppResult<Vec<StockLevel>>;

    /// Newest audit entries first, skipping the `offset` newest
    async fn recent_audit(&self, limit: i64, offset: i64) -> AppResult<Vec<AuditEntry>>;

    /// A stored inbound or outbound movement with its lines
    async fn movement(&self, id: i64) -> AppResult<Movement>;

    /// Cheap liveness probe of the backing storage
    async fn ping(&self) -> AppResult<()>;
}

/// Per-(product, warehouse) quantity counters.
///
/// Implementations serialize concurrent units touching the same key: once
/// a unit has locked, incremented or decremented a key, no other unit can
/// change that key until the first one ends.
#[async_trait]
pub trait StockLedger: Send {
    /// Current quantity of a key, locking it for the rest of the unit
    async fn lock_stock(&mut self, key: StockKey) -> AppResult<i64>;

    /// Add `delta` (> 0), creating the counter if absent. Returns the new quantity.
    async fn increment(&mut self, key: StockKey, delta: i64) -> AppResult<i64>;

    /// Subtract `delta` (> 0). Fails with `InsufficientStock` instead of
    /// going below zero. Returns the new quantity.
    async fn decrement(&mut self, key: StockKey, delta: i64) -> AppResult<i64>;
}

/// Reference data resolved while a movement is built
#[async_trait]
pub trait Catalog: Send {
    async fn product_by_id(&mut self, id: ProductId) -> AppResult<Option<Product>>;

    /// Exact, case-sensitive SKU match
    async fn product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>>;

    /// Fails with a validation error when the SKU already exists
    async fn create_product(&mut self, product: NewProduct) -> AppResult<Product>;

    async fn set_product_cost(&mut self, id: ProductId, cost_price: Decimal) -> AppResult<()>;

    async fn warehouse_by_id(&mut self, id: WarehouseId) -> AppResult<Option<Warehouse>>;

    /// Case-insensitive name match
    async fn warehouse_by_name(&mut self, name: &str) -> AppResult<Option<Warehouse>>;

    /// Find by name (case-insensitive) or create with the given location
    async fn ensure_warehouse(&mut self, name: &str, location: &str) -> AppResult<Warehouse>;

    async fn supplier_by_id(&mut self, id: i64) -> AppResult<Option<Supplier>>;

    /// Find by name (case-insensitive) or create with the given contact
    async fn find_or_create_supplier(&mut self, name: &str, contact: &str) -> AppResult<Supplier>;

    async fn customer_by_id(&mut self, id: i64) -> AppResult<Option<Customer>>;

    /// Find by name (case-insensitive) or create with the given contact
    async fn find_or_create_customer(&mut self, name: &str, contact: &str) -> AppResult<Customer>;
}

/// Movement and transfer records
#[async_trait]
pub trait MovementLog: Send {
    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement>;

    async fn insert_transfer(
        &mut self,
        product_id: ProductId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: i64,
    ) -> AppResult<TransferRecord>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditLog: Send {
    async fn append_audit(&mut self, entry: NewAuditEntry) -> AppResult<AuditEntry>;
}

/// One atomic unit of work
#[async_trait]
pub trait UnitOfWork: StockLedger + Catalog + MovementLog + AuditLog {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}
