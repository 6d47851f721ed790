//! Warehouses and trading counterparties

use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, SupplierId, WarehouseId};

/// A physical stock location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: String,
}

/// Goods are received from suppliers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub contact: String,
}

/// Goods are shipped to customers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub contact: String,
}
