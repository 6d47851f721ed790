//! HTTP API tests
//!
//! Drive the full router (auth middleware, extractors, error mapping)
//! against the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shared::{NewProduct, ProductCategory, Role, StockKey};
use tower::ServiceExt;
use wit_backend::config::{
    Config, DatabaseConfig, ImportConfig, JwtConfig, ServerConfig, StorageBackend, StorageConfig,
};
use wit_backend::middleware::auth::{encode_jwt, Claims};
use wit_backend::store::{MemoryStore, Store};
use wit_backend::{create_app, AppState};

const SECRET: &str = "test-secret";

fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        server: ServerConfig::default(),
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            acquire_timeout_secs: 1,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
        },
        jwt: JwtConfig {
            secret: SECRET.to_string(),
        },
        import: ImportConfig::default(),
    }
}

async fn app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    store
        .seed_product(NewProduct {
            sku: "WID-1".to_string(),
            name: "Widget".to_string(),
            category: ProductCategory::General,
            price: Decimal::new(1500, 2),
            cost_price: Decimal::ZERO,
            min_stock: 10,
        })
        .await
        .unwrap();
    store.seed_warehouse("Main Warehouse", "HQ").await;
    store.seed_warehouse("Overflow", "Dock 2").await;

    let state = AppState::new(Arc::new(store.clone()), test_config());
    (create_app(state), store)
}

fn token(role: Role) -> String {
    let claims = Claims::new(11, role, chrono::Duration::hours(1));
    encode_jwt(&claims, SECRET).unwrap()
}

fn post_json(uri: &str, role: Role, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token(role)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["storage"], "connected");
}

#[tokio::test]
async fn test_movements_require_a_token() {
    let (app, _) = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/movements/inbound")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_inbound_then_oversized_outbound() {
    let (app, store) = app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/movements/inbound",
            Role::Staff,
            json!({
                "warehouse_id": 1,
                "reference": "PO-1",
                "items": [{ "product_id": 1, "quantity": 70 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["kind"], "movement");
    assert_eq!(body["record"]["direction"], "IN");

    let response = app
        .oneshot(post_json(
            "/api/v1/movements/outbound",
            Role::Staff,
            json!({
                "warehouse_id": 1,
                "reference": "SO-1",
                "items": [{ "product_id": 1, "quantity": 80 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(
        body["error"]["message"],
        "Insufficient stock for SKU 'WID-1'. Available: 70"
    );

    assert_eq!(store.stock_level(StockKey::new(1, 1)).await.unwrap(), 70);
}

#[tokio::test]
async fn test_staff_cannot_transfer_or_import() {
    let (app, _) = app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/movements/transfer",
            Role::Staff,
            json!({ "product_id": 1, "from_warehouse_id": 1, "to_warehouse_id": 2, "quantity": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(post_json("/api/v1/imports/inbound", Role::Staff, json!([])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_csv_outbound_import_reports_per_order() {
    let (app, store) = app().await;
    store.seed_stock(StockKey::new(1, 1), 5).await;

    let csv = "reference,warehouse,customer,date,sku,quantity,price\n\
               SO-1,Main Warehouse,Bob's Shop,,WID-1,2,\n\
               SO-2,Main Warehouse,,,MISSING,1,\n";
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/imports/outbound")
        .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Manager)))
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["success"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["errors"][0], "Order SO-2: SKU 'MISSING' not found");
    assert_eq!(store.stock_level(StockKey::new(1, 1)).await.unwrap(), 3);
}

#[tokio::test]
async fn test_stock_and_audit_reads() {
    let (app, store) = app().await;
    store.seed_stock(StockKey::new(1, 2), 9).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/stock?warehouse_id=2")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Staff)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["quantity"], 9);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/audit?per_page=10")
                .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Admin)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_recorded_movement_can_be_fetched() {
    let (app, _) = app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/movements/inbound",
            Role::Staff,
            json!({
                "warehouse_id": 2,
                "reference": "PO-7",
                "items": [{ "product_id": 1, "quantity": 3 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = json_body(response).await["record"]["id"].as_i64().unwrap();

    let get = |uri: String| {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token(Role::Staff)))
            .body(Body::empty())
            .unwrap()
    };

    let response = app
        .clone()
        .oneshot(get(format!("/api/v1/movements/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["reference"], "PO-7");
    assert_eq!(body["warehouse_id"], 2);

    let response = app
        .oneshot(get(format!("/api/v1/movements/{}", id + 100)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
