//! HTTP request handlers

pub mod audit;
pub mod health;
pub mod imports;
pub mod movements;
pub mod stock;

pub use audit::list_audit;
pub use health::health_check;
pub use imports::{import_inbound, import_outbound, import_products, ImportRows};
pub use movements::{get_movement, record_inbound, record_outbound, record_transfer};
pub use stock::get_stock;
