//! Shared types and models for the Warehouse Inventory Tracker
//!
//! This crate holds the domain types exchanged between the storage layer,
//! the movement services, and the HTTP surface, plus the pure validation
//! rules that every stock movement passes before touching storage.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
