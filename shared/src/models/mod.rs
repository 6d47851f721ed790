//! Domain models for the Warehouse Inventory Tracker

mod audit;
mod import;
mod movement;
mod party;
mod product;
mod stock;

pub use audit::*;
pub use import::*;
pub use movement::*;
pub use party::*;
pub use product::*;
pub use stock::*;
