//! Bulk import rows and results
//!
//! Rows arrive already parsed from a tabular source. Column names follow
//! the upload templates: `reference, warehouse, supplier|customer, date,
//! sku, quantity, cost|price`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of a bulk inbound upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundImportRow {
    #[serde(default)]
    pub reference: Option<String>,
    pub warehouse: String,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub sku: String,
    pub quantity: i64,
    #[serde(default)]
    pub cost: Option<Decimal>,
}

/// One line of a bulk outbound upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundImportRow {
    #[serde(default)]
    pub reference: Option<String>,
    pub warehouse: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub sku: String,
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// One line of a bulk product upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImportRow {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub min_stock: Option<i32>,
    #[serde(default)]
    pub stock_level: Option<i64>,
}

/// Rows that carry a grouping reference
pub trait GroupedRow {
    fn reference(&self) -> Option<&str>;
}

impl GroupedRow for InboundImportRow {
    fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

impl GroupedRow for OutboundImportRow {
    fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// Aggregate outcome of one import run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: usize,
    pub failed: usize,
    /// One message per failed group, prefixed with the group's reference
    pub errors: Vec<String>,
}

impl ImportResult {
    pub fn record_success(&mut self) {
        self.success += 1;
    }

    pub fn record_failure(&mut self, message: String) {
        self.failed += 1;
        self.errors.push(message);
    }
}
