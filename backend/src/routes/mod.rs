//! Route definitions for the Warehouse Inventory Tracker

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - movements
        .nest("/movements", movement_routes(state.clone()))
        // Protected routes - bulk uploads
        .nest("/imports", import_routes(state.clone()))
        // Protected routes - reads
        .merge(read_routes(state))
}

/// Movement routes (protected)
fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/inbound", post(handlers::record_inbound))
        .route("/outbound", post(handlers::record_outbound))
        .route("/transfer", post(handlers::record_transfer))
        .route("/:movement_id", get(handlers::get_movement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Bulk upload routes (protected)
fn import_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/inbound", post(handlers::import_inbound))
        .route("/outbound", post(handlers::import_outbound))
        .route("/products", post(handlers::import_products))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock and audit reads (protected)
fn read_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::get_stock))
        .route("/audit", get(handlers::list_audit))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
