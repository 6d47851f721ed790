//! Product catalog models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Minimum-stock threshold applied when none is supplied
pub const DEFAULT_MIN_STOCK: i32 = 10;

/// A stocked product. The SKU is immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    /// Retail unit price
    pub price: Decimal,
    /// Unit cost price
    pub cost_price: Decimal,
    pub min_stock: i32,
    pub is_archived: bool,
}

/// Input for creating a product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub min_stock: i32,
}

/// Fixed category whitelist
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProductCategory {
    Electronics,
    Clothing,
    #[serde(rename = "Home & Garden")]
    HomeAndGarden,
    Automotive,
    #[default]
    General,
}

impl ProductCategory {
    pub const ALL: [ProductCategory; 5] = [
        ProductCategory::Electronics,
        ProductCategory::Clothing,
        ProductCategory::HomeAndGarden,
        ProductCategory::Automotive,
        ProductCategory::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Electronics => "Electronics",
            ProductCategory::Clothing => "Clothing",
            ProductCategory::HomeAndGarden => "Home & Garden",
            ProductCategory::Automotive => "Automotive",
            ProductCategory::General => "General",
        }
    }

    /// Match a free-text category against the whitelist, ignoring case and
    /// surrounding whitespace. Anything unrecognised falls back to `General`.
    pub fn match_name(raw: &str) -> Self {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ProductCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_match_ignores_case_and_whitespace() {
        assert_eq!(ProductCategory::match_name("electronics"), ProductCategory::Electronics);
        assert_eq!(ProductCategory::match_name("  HOME & garden "), ProductCategory::HomeAndGarden);
        assert_eq!(ProductCategory::match_name("Automotive"), ProductCategory::Automotive);
    }

    #[test]
    fn test_unknown_category_falls_back_to_general() {
        assert_eq!(ProductCategory::match_name("Toys"), ProductCategory::General);
        assert_eq!(ProductCategory::match_name(""), ProductCategory::General);
    }

    #[test]
    fn test_category_serializes_as_display_name() {
        let json = serde_json::to_string(&ProductCategory::HomeAndGarden).unwrap();
        assert_eq!(json, "\"Home & Garden\"");
    }
}
