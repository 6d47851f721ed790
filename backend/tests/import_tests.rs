//! Batch importer tests
//!
//! Groups are applied independently: a failing invoice or order is
//! reported by reference while the rest of the upload is committed.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    Actor, AuditAction, Direction, InboundImportRow, NewProduct, OutboundImportRow, Product,
    ProductCategory, ProductImportRow, Role, StockKey, Warehouse,
};
use wit_backend::config::ImportConfig;
use wit_backend::services::{decode_csv, BatchImporter};
use wit_backend::store::{MemoryStore, Store};

struct Fixture {
    store: MemoryStore,
    importer: BatchImporter,
    widget: Product,
    gadget: Product,
    main: Warehouse,
}

async fn fixture_with(config: ImportConfig) -> Fixture {
    let store = MemoryStore::new();
    let widget = store
        .seed_product(NewProduct {
            sku: "WID-1".to_string(),
            name: "Widget".to_string(),
            category: ProductCategory::General,
            price: Decimal::new(1500, 2),
            cost_price: Decimal::new(500, 2),
            min_stock: 10,
        })
        .await
        .unwrap();
    let gadget = store
        .seed_product(NewProduct {
            sku: "GAD-1".to_string(),
            name: "Gadget".to_string(),
            category: ProductCategory::Electronics,
            price: Decimal::new(9900, 2),
            cost_price: Decimal::new(4000, 2),
            min_stock: 5,
        })
        .await
        .unwrap();
    let main = store.seed_warehouse("Main Warehouse", "HQ").await;
    let importer = BatchImporter::new(Arc::new(store.clone()), config);

    Fixture {
        store,
        importer,
        widget,
        gadget,
        main,
    }
}

async fn fixture() -> Fixture {
    fixture_with(ImportConfig::default()).await
}

fn manager() -> Actor {
    Actor::user(3, Role::Manager)
}

fn inbound_row(reference: &str, sku: &str, quantity: i64, cost: Option<Decimal>) -> InboundImportRow {
    InboundImportRow {
        reference: Some(reference.to_string()),
        warehouse: "main warehouse".to_string(),
        supplier: Some("Acme Corp".to_string()),
        date: None,
        sku: sku.to_string(),
        quantity,
        cost,
    }
}

fn outbound_row(reference: &str, sku: &str, quantity: i64) -> OutboundImportRow {
    OutboundImportRow {
        reference: Some(reference.to_string()),
        warehouse: "Main Warehouse".to_string(),
        customer: None,
        date: None,
        sku: sku.to_string(),
        quantity,
        price: None,
    }
}

// ============================================================================
// Inbound
// ============================================================================

#[tokio::test]
async fn test_bad_group_does_not_block_the_others() {
    let f = fixture().await;
    let rows = vec![
        inbound_row("INV-1", "WID-1", 5, None),
        inbound_row("INV-2", "WID-1", 5, None),
        inbound_row("INV-2", "NOPE-9", 1, None),
        inbound_row("INV-3", "GAD-1", 2, None),
    ];

    let result = f.importer.import_inbound(manager(), rows).await;

    assert_eq!(result.success, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("Invoice INV-2:"));
    assert!(result.errors[0].contains("NOPE-9"));

    let widget = StockKey::new(f.widget.id, f.main.id);
    let gadget = StockKey::new(f.gadget.id, f.main.id);
    assert_eq!(f.store.stock_level(widget).await.unwrap(), 5);
    assert_eq!(f.store.stock_level(gadget).await.unwrap(), 2);

    let movements = f.store.movements().await;
    let refs: Vec<&str> = movements.iter().map(|m| m.reference.as_str()).collect();
    assert_eq!(refs, vec!["INV-1", "INV-3"]);

    let audit = f.store.audit_entries().await;
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.action == AuditAction::BulkInbound));
}

#[tokio::test]
async fn test_unreferenced_rows_share_one_placeholder_movement() {
    let f = fixture().await;
    let mut first = inbound_row("", "WID-1", 1, None);
    first.reference = None;
    let second = inbound_row("   ", "GAD-1", 1, None);

    let result = f.importer.import_inbound(manager(), vec![first, second]).await;

    assert_eq!(result.success, 1);
    let movements = f.store.movements().await;
    assert_eq!(movements.len(), 1);
    assert!(movements[0].reference.starts_with("BULK-IMPORT-"));
    assert_eq!(movements[0].lines.len(), 2);
}

#[tokio::test]
async fn test_inbound_creates_supplier_once_and_overwrites_cost() {
    let f = fixture().await;
    let rows = vec![
        inbound_row("INV-10", "WID-1", 4, Some(Decimal::new(650, 2))),
        inbound_row("INV-11", "GAD-1", 1, Some(Decimal::ZERO)),
    ];

    let result = f.importer.import_inbound(manager(), rows).await;
    assert_eq!(result.success, 2);

    let suppliers = f.store.suppliers().await;
    assert_eq!(suppliers.len(), 1);
    assert_eq!(suppliers[0].name, "Acme Corp");
    assert_eq!(suppliers[0].contact, "Imported");

    let widget = f.store.product(f.widget.id).await.unwrap();
    assert_eq!(widget.cost_price, Decimal::new(650, 2));
    let gadget = f.store.product(f.gadget.id).await.unwrap();
    assert_eq!(gadget.cost_price, Decimal::new(4000, 2));

    let movements = f.store.movements().await;
    assert_eq!(movements[0].direction, Direction::In);
    assert_eq!(movements[0].counterparty_id, Some(suppliers[0].id));
}

#[tokio::test]
async fn test_cost_overwrite_can_be_disabled() {
    let config = ImportConfig {
        overwrite_product_cost: false,
        ..ImportConfig::default()
    };
    let f = fixture_with(config).await;

    let rows = vec![inbound_row("INV-12", "WID-1", 4, Some(Decimal::new(650, 2)))];
    let result = f.importer.import_inbound(manager(), rows).await;
    assert_eq!(result.success, 1);

    let widget = f.store.product(f.widget.id).await.unwrap();
    assert_eq!(widget.cost_price, Decimal::new(500, 2));
    assert_eq!(f.store.movements().await[0].lines[0].unit_amount, Decimal::new(650, 2));
}

#[tokio::test]
async fn test_unknown_warehouse_fails_its_group() {
    let f = fixture().await;
    let mut row = inbound_row("INV-20", "WID-1", 1, None);
    row.warehouse = "Atlantis".to_string();

    let result = f.importer.import_inbound(manager(), vec![row]).await;

    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0], "Invoice INV-20: Warehouse 'Atlantis' not found");
    assert!(f.store.suppliers().await.is_empty());
}

// ============================================================================
// Outbound
// ============================================================================

#[tokio::test]
async fn test_outbound_import_reports_shortage_by_order() {
    let f = fixture().await;
    f.store
        .seed_stock(StockKey::new(f.widget.id, f.main.id), 10)
        .await;

    let rows = vec![
        outbound_row("SO-1", "WID-1", 4),
        outbound_row("SO-2", "WID-1", 7),
        outbound_row("SO-3", "WID-1", 6),
    ];
    let result = f.importer.import_outbound(manager(), rows).await;

    assert_eq!(result.success, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(
        result.errors[0],
        "Order SO-2: Insufficient stock for SKU 'WID-1'. Available: 6"
    );
    assert_eq!(
        f.store
            .stock_level(StockKey::new(f.widget.id, f.main.id))
            .await
            .unwrap(),
        0
    );

    let customers = f.store.customers().await;
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0].name, "Walk-in Customer");

    let movements = f.store.movements().await;
    assert_eq!(movements[0].lines[0].unit_amount, Decimal::new(1500, 2));
    assert!(f
        .store
        .audit_entries()
        .await
        .iter()
        .all(|e| e.action == AuditAction::BulkOutbound));
}

// ============================================================================
// Products
// ============================================================================

#[tokio::test]
async fn test_product_import_applies_defaults_and_opening_stock() {
    let f = fixture().await;
    let rows = vec![
        ProductImportRow {
            sku: "LAMP-1".to_string(),
            name: "Desk Lamp".to_string(),
            category: Some("home & garden".to_string()),
            price: Decimal::new(3500, 2),
            cost_price: None,
            min_stock: None,
            stock_level: Some(12),
        },
        ProductImportRow {
            sku: "ODD-1".to_string(),
            name: "Oddity".to_string(),
            category: Some("Antiques".to_string()),
            price: Decimal::ONE,
            cost_price: Some(Decimal::ONE),
            min_stock: Some(2),
            stock_level: None,
        },
        ProductImportRow {
            sku: "WID-1".to_string(),
            name: "Duplicate".to_string(),
            category: None,
            price: Decimal::ONE,
            cost_price: None,
            min_stock: None,
            stock_level: None,
        },
    ];

    let result = f.importer.import_products(manager(), rows).await;

    assert_eq!(result.success, 2);
    assert_eq!(result.failed, 1);
    assert!(result.errors[0].starts_with("Product WID-1:"));

    let lamp = f.store.product(3).await.unwrap();
    assert_eq!(lamp.sku, "LAMP-1");
    assert_eq!(lamp.category, ProductCategory::HomeAndGarden);
    assert_eq!(lamp.min_stock, 10);
    assert_eq!(
        f.store
            .stock_level(StockKey::new(lamp.id, f.main.id))
            .await
            .unwrap(),
        12
    );

    let oddity = f.store.product(4).await.unwrap();
    assert_eq!(oddity.category, ProductCategory::General);

    let audit = f.store.audit_entries().await;
    assert_eq!(audit.len(), 2);
    assert!(audit.iter().all(|e| e.action == AuditAction::BulkImport));
}

#[tokio::test]
async fn test_csv_upload_feeds_the_importer() {
    let f = fixture().await;
    let csv = "reference,warehouse,supplier,date,sku,quantity,cost\n\
               INV-30,Main Warehouse,Acme Corp,2024-05-01,WID-1,3,\n\
               INV-30,Main Warehouse,Acme Corp,2024-05-01,GAD-1,2,41.00\n";
    let rows: Vec<InboundImportRow> = decode_csv(csv.as_bytes()).unwrap();

    let result = f.importer.import_inbound(manager(), rows).await;

    assert_eq!(result.success, 1);
    let movement = &f.store.movements().await[0];
    assert_eq!(movement.reference, "INV-30");
    assert_eq!(movement.movement_date.to_string(), "2024-05-01");
    assert_eq!(movement.total_quantity(), 5);
}
