//! Stock movement models
//!
//! A movement is either an inbound receipt, an outbound shipment, or a
//! transfer between two warehouses. Inbound and outbound movements are
//! stored with their lines and are immutable once created.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CustomerId, ProductId, SupplierId, WarehouseId};

/// Movement direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN" => Some(Direction::In),
            "OUT" => Some(Direction::Out),
            _ => None,
        }
    }
}

/// A requested line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Unit cost for inbound lines, unit price for outbound lines
    #[serde(default)]
    pub unit_amount: Option<Decimal>,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self {
            product_id,
            quantity,
            unit_amount: None,
        }
    }

    pub fn with_unit_amount(mut self, amount: Decimal) -> Self {
        self.unit_amount = Some(amount);
        self
    }
}

/// Receive goods into a warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    pub reference: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub items: Vec<LineItem>,
}

/// Ship goods out of a warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub reference: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub document_url: Option<String>,
    pub items: Vec<LineItem>,
}

/// Move one product between two warehouses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// The single entry point accepted by the movement executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementRequest {
    Inbound(InboundRequest),
    Outbound(OutboundRequest),
    Transfer(TransferRequest),
}

impl MovementRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            MovementRequest::Inbound(_) => "inbound",
            MovementRequest::Outbound(_) => "outbound",
            MovementRequest::Transfer(_) => "transfer",
        }
    }
}

/// A stored movement line with the price or cost captured at movement time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_amount: Decimal,
}

/// A stored inbound or outbound movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub reference: String,
    pub direction: Direction,
    /// Supplier id for inbound, customer id for outbound
    pub counterparty_id: Option<i64>,
    pub warehouse_id: WarehouseId,
    pub movement_date: NaiveDate,
    pub document_url: Option<String>,
    pub lines: Vec<MovementLine>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Input for persisting a movement
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub reference: String,
    pub direction: Direction,
    pub counterparty_id: Option<i64>,
    pub warehouse_id: WarehouseId,
    pub movement_date: NaiveDate,
    pub document_url: Option<String>,
    pub lines: Vec<MovementLine>,
}

/// A stored transfer between two warehouses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: i64,
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

/// What a successful movement produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum MovementOutcome {
    Movement(Movement),
    Transfer(TransferRecord),
}

impl MovementOutcome {
    /// Identifier of the created movement or transfer record
    pub fn id(&self) -> i64 {
        match self {
            MovementOutcome::Movement(m) => m.id,
            MovementOutcome::Transfer(t) => t.id,
        }
    }

    pub fn as_movement(&self) -> Option<&Movement> {
        match self {
            MovementOutcome::Movement(m) => Some(m),
            MovementOutcome::Transfer(_) => None,
        }
    }
}
