use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    AuditAction, AuditEntry, Customer, Direction, Movement, MovementLine, NewAuditEntry,
    NewMovement, NewProduct, Product, ProductCategory, ProductId, StockKey, StockLevel, Supplier,
    TransferRecord, Warehouse, WarehouseId,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{AuditLog, Catalog, MovementLog, StockLedger, Store, UnitOfWork};
use crate::error::{AppError, AppResult};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Row for product queries
#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    sku: String,
    name: String,
    category: String,
    price: Decimal,
    cost_price: Decimal,
    min_stock: i32,
    is_archived: bool,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category: ProductCategory::match_name(&row.category),
            price: row.price,
            cost_price: row.cost_price,
            min_stock: row.min_stock,
            is_archived: row.is_archived,
        }
    }
}

#[derive(Debug, FromRow)]
struct WarehouseRow {
    id: i64,
    name: String,
    location: String,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Warehouse {
            id: row.id,
            name: row.name,
            location: row.location,
        }
    }
}

/// Suppliers and customers share a shape
#[derive(Debug, FromRow)]
struct PartyRow {
    id: i64,
    name: String,
    contact: String,
}

#[derive(Debug, FromRow)]
struct StockRow {
    product_id: i64,
    warehouse_id: i64,
    quantity: i64,
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: i64,
    user_id: Option<i64>,
    action: String,
    entity_type: String,
    entity_id: i64,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let action = AuditAction::parse(&row.action)
            .ok_or_else(|| AppError::Storage(format!("unknown audit action '{}'", row.action)))?;
        Ok(AuditEntry {
            id: row.id,
            user_id: row.user_id,
            action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            details: row.details,
            created_at: row.created_at,
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, sku, name, category, price, cost_price, min_stock, is_archived";

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn stock_level(&self, key: StockKey) -> AppResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM stock_levels WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    async fn stock_in_warehouse(&self, warehouse_id: WarehouseId) -> AppResult<Vec<StockLevel>> {
        let rows = sqlx::query_as::<_, StockRow>(
            r#"
            SELECT product_id, warehouse_id, quantity
            FROM stock_levels
            WHERE warehouse_id = $1
            ORDER BY product_id
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| StockLevel {
                product_id: r.product_id,
                warehouse_id: r.warehouse_id,
                quantity: r.quantity,
            })
            .collect())
    }

    async fn recent_audit(&self, limit: i64, offset: i64) -> AppResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, details, created_at
            FROM audit_entries
            ORDER BY id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn movement(&self, id: i64) -> AppResult<Movement> {
        self.load_movement(id).await
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Unit of work backed by one database transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn quantity(&mut self, key: StockKey) -> AppResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM stock_levels WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    async fn find_party(&mut self, table: &str, name: &str) -> AppResult<Option<PartyRow>> {
        let row = sqlx::query_as::<_, PartyRow>(&format!(
            "SELECT id, name, contact FROM {} WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
            table
        ))
        .bind(name.trim())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn find_or_create_party(
        &mut self,
        table: &str,
        name: &str,
        contact: &str,
    ) -> AppResult<PartyRow> {
        if let Some(found) = self.find_party(table, name).await? {
            return Ok(found);
        }

        let row = sqlx::query_as::<_, PartyRow>(&format!(
            "INSERT INTO {} (name, contact) VALUES ($1, $2) RETURNING id, name, contact",
            table
        ))
        .bind(name.trim())
        .bind(contact)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn party_by_id(&mut self, table: &str, id: i64) -> AppResult<Option<PartyRow>> {
        let row = sqlx::query_as::<_, PartyRow>(&format!(
            "SELECT id, name, contact FROM {} WHERE id = $1",
            table
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl StockLedger for PgUnitOfWork {
    async fn lock_stock(&mut self, key: StockKey) -> AppResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT quantity FROM stock_levels
            WHERE product_id = $1 AND warehouse_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(quantity.unwrap_or(0))
    }

    async fn increment(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        let quantity = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO stock_levels (product_id, warehouse_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id, warehouse_id)
            DO UPDATE SET quantity = stock_levels.quantity + EXCLUDED.quantity,
                          updated_at = NOW()
            RETURNING quantity
            "#,
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(delta)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(quantity)
    }

    async fn decrement(&mut self, key: StockKey, delta: i64) -> AppResult<i64> {
        // Conditional update: the row lock it takes is held until the
        // transaction ends, so the check and the write cannot interleave.
        let remaining = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE stock_levels
            SET quantity = quantity - $3, updated_at = NOW()
            WHERE product_id = $1 AND warehouse_id = $2 AND quantity >= $3
            RETURNING quantity
            "#,
        )
        .bind(key.product_id)
        .bind(key.warehouse_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        match remaining {
            Some(quantity) => Ok(quantity),
            None => {
                let available = self.quantity(key).await?;
                Err(AppError::InsufficientStock {
                    product_id: key.product_id,
                    sku: None,
                    available,
                    requested: delta,
                })
            }
        }
    }
}

#[async_trait]
impl Catalog for PgUnitOfWork {
    async fn product_by_id(&mut self, id: ProductId) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn product_by_sku(&mut self, sku: &str) -> AppResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE sku = $1",
            PRODUCT_COLUMNS
        ))
        .bind(sku)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn create_product(&mut self, product: NewProduct) -> AppResult<Product> {
        let result = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (sku, name, category, price, cost_price, min_stock)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.category.as_str())
        .bind(product.price)
        .bind(product.cost_price)
        .bind(product.min_stock)
        .fetch_one(&mut *self.tx)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                AppError::validation("sku", format!("SKU '{}' already exists", product.sku)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_product_cost(&mut self, id: ProductId, cost_price: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE products SET cost_price = $1, updated_at = NOW() WHERE id = $2")
            .bind(cost_price)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        Ok(())
    }

    async fn warehouse_by_id(&mut self, id: WarehouseId) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location FROM warehouses WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Warehouse::from))
    }

    async fn warehouse_by_name(&mut self, name: &str) -> AppResult<Option<Warehouse>> {
        let row = sqlx::query_as::<_, WarehouseRow>(
            "SELECT id, name, location FROM warehouses WHERE LOWER(name) = LOWER($1) ORDER BY id LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(Warehouse::from))
    }

    async fn ensure_warehouse(&mut self, name: &str, location: &str) -> AppResult<Warehouse> {
        if let Some(found) = self.warehouse_by_name(name).await? {
            return Ok(found);
        }

        let row = sqlx::query_as::<_, WarehouseRow>(
            "INSERT INTO warehouses (name, location) VALUES ($1, $2) RETURNING id, name, location",
        )
        .bind(name)
        .bind(location)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row.into())
    }

    async fn supplier_by_id(&mut self, id: i64) -> AppResult<Option<Supplier>> {
        Ok(self.party_by_id("suppliers", id).await?.map(|r| Supplier {
            id: r.id,
            name: r.name,
            contact: r.contact,
        }))
    }

    async fn find_or_create_supplier(&mut self, name: &str, contact: &str) -> AppResult<Supplier> {
        let r = self.find_or_create_party("suppliers", name, contact).await?;
        Ok(Supplier {
            id: r.id,
            name: r.name,
            contact: r.contact,
        })
    }

    async fn customer_by_id(&mut self, id: i64) -> AppResult<Option<Customer>> {
        Ok(self.party_by_id("customers", id).await?.map(|r| Customer {
            id: r.id,
            name: r.name,
            contact: r.contact,
        }))
    }

    async fn find_or_create_customer(&mut self, name: &str, contact: &str) -> AppResult<Customer> {
        let r = self.find_or_create_party("customers", name, contact).await?;
        Ok(Customer {
            id: r.id,
            name: r.name,
            contact: r.contact,
        })
    }
}

#[async_trait]
impl MovementLog for PgUnitOfWork {
    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO movements (
                reference, direction, counterparty_id, warehouse_id, movement_date, document_url
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, created_at
            "#,
        )
        .bind(&movement.reference)
        .bind(movement.direction.as_str())
        .bind(movement.counterparty_id)
        .bind(movement.warehouse_id)
        .bind(movement.movement_date)
        .bind(&movement.document_url)
        .fetch_one(&mut *self.tx)
        .await?;

        for (position, line) in movement.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO movement_lines (movement_id, position, product_id, quantity, unit_amount)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_amount)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(Movement {
            id,
            reference: movement.reference,
            direction: movement.direction,
            counterparty_id: movement.counterparty_id,
            warehouse_id: movement.warehouse_id,
            movement_date: movement.movement_date,
            document_url: movement.document_url,
            lines: movement.lines,
            created_at,
        })
    }

    async fn insert_transfer(
        &mut self,
        product_id: ProductId,
        from_warehouse_id: WarehouseId,
        to_warehouse_id: WarehouseId,
        quantity: i64,
    ) -> AppResult<TransferRecord> {
        let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            INSERT INTO transfers (product_id, from_warehouse_id, to_warehouse_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(product_id)
        .bind(from_warehouse_id)
        .bind(to_warehouse_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(TransferRecord {
            id,
            product_id,
            from_warehouse_id,
            to_warehouse_id,
            quantity,
            created_at,
        })
    }
}

#[async_trait]
impl AuditLog for PgUnitOfWork {
    async fn append_audit(&mut self, entry: NewAuditEntry) -> AppResult<AuditEntry> {
        let row = sqlx::query_as::<_, AuditRow>(
            r#"
            INSERT INTO audit_entries (user_id, action, entity_type, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, action, entity_type, entity_id, details, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.details)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// Row for reading a movement back with its lines
#[derive(Debug, FromRow)]
struct MovementRow {
    id: i64,
    reference: String,
    direction: String,
    counterparty_id: Option<i64>,
    warehouse_id: i64,
    movement_date: NaiveDate,
    document_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MovementLineRow {
    product_id: i64,
    quantity: i64,
    unit_amount: Decimal,
}

impl PgStore {
    async fn load_movement(&self, id: i64) -> AppResult<Movement> {
        let row = sqlx::query_as::<_, MovementRow>(
            r#"
            SELECT id, reference, direction, counterparty_id, warehouse_id,
                   movement_date, document_url, created_at
            FROM movements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        let lines = sqlx::query_as::<_, MovementLineRow>(
            r#"
            SELECT product_id, quantity, unit_amount
            FROM movement_lines
            WHERE movement_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let direction = Direction::parse(&row.direction)
            .ok_or_else(|| AppError::Storage(format!("unknown direction '{}'", row.direction)))?;

        Ok(Movement {
            id: row.id,
            reference: row.reference,
            direction,
            counterparty_id: row.counterparty_id,
            warehouse_id: row.warehouse_id,
            movement_date: row.movement_date,
            document_url: row.document_url,
            lines: lines
                .into_iter()
                .map(|l| MovementLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                    unit_amount: l.unit_amount,
                })
                .collect(),
            created_at: row.created_at,
        })
    }
}
