//! Business logic services for the Warehouse Inventory Tracker

pub mod audit;
pub mod import;
pub mod movement;
pub mod stock;

pub use audit::AuditService;
pub use import::{decode_csv, group_rows, BatchImporter, ImportGroup};
pub use movement::{MovementExecutor, MovementOrigin};
pub use stock::StockService;
