//! HTTP middleware

pub mod auth;

pub use auth::{auth_middleware, require_stock_manager, AuthUser, CurrentUser};
