use rust_decimal_macros::dec;

use woosync_core::config::StatusMapping;
use woosync_core::domain::{ItemCode, RecordName, RemoteEntity, RemoteId, StockLevel, SyncScope};
use woosync_core::ports::ILocalStore;
use woosync_sync::{PushOutcome, SyncError};

use crate::common::{self, harness, order, simple_product, WAREHOUSE};

fn shipped_when_completed() -> Vec<StatusMapping> {
    vec![StatusMapping {
        erpnext_sales_order_status: "Completed".to_string(),
        woocommerce_sales_order_status: "Shipped".to_string(),
    }]
}

async fn synced_order_name(h: &common::Harness) -> RecordName {
    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    h.store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap()
        .name
}

// ============================================================================
// Stock
// ============================================================================

#[tokio::test]
async fn stock_levels_are_pushed() {
    let h = harness(|server| {
        server.enable_stock_level_sync = true;
        server.subtract_reserved_stock = true;
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let code = ItemCode::new("7".into()).unwrap();
    for (warehouse, actual, reserved) in [
        (WAREHOUSE, dec!(12), dec!(2)),
        ("Transit - WS", dec!(40), dec!(0)),
    ] {
        h.store
            .save_stock_level(&StockLevel {
                item_code: code.clone(),
                warehouse: warehouse.to_string(),
                actual_qty: actual,
                reserved_qty: reserved,
            })
            .await
            .unwrap();
    }

    let outcome = h.orchestrator.run_scope(SyncScope::Stock).await.unwrap();
    assert_eq!(outcome.report.updated_remote, 1);

    let product = h.shop.get(&RemoteEntity::Product, 7).unwrap();
    assert_eq!(product["stock_quantity"], 10);

    // The push does not make the item look changed on either side
    let items = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(items.report.writes(), 0);
}

#[tokio::test]
async fn stock_sync_off_pushes_nothing() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let outcome = h.orchestrator.run_scope(SyncScope::Stock).await.unwrap();
    assert_eq!(outcome.report.processed(), 0);
    assert!(h.shop.writes().is_empty());
}

// ============================================================================
// Order status
// ============================================================================

#[tokio::test]
async fn mapped_status_is_pushed() {
    let h = harness(|server| {
        server.enable_so_status_sync = true;
        server.so_status_map = shipped_when_completed();
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    let name = synced_order_name(&h).await;

    let mut sales_order = h.store.get_sales_order(&name).await.unwrap().unwrap();
    sales_order.status = "Completed".to_string();
    h.store.save_sales_order(&sales_order).await.unwrap();

    let outcome = h.orchestrator.push_order_status(&name).await.unwrap();
    assert_eq!(
        outcome,
        PushOutcome::Pushed {
            remote_status: "Shipped".to_string()
        }
    );
    let remote = h.shop.get(&RemoteEntity::Order, 1042).unwrap();
    assert_eq!(remote["status"], "completed");
}

#[tokio::test]
async fn orders_pass_pushes_edited_status_once() {
    let h = harness(|server| {
        server.enable_so_status_sync = true;
        server.so_status_map = shipped_when_completed();
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    let name = synced_order_name(&h).await;

    let mut sales_order = h.store.get_sales_order(&name).await.unwrap().unwrap();
    sales_order.status = "Completed".to_string();
    h.store.save_sales_order(&sales_order).await.unwrap();

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(h.shop.writes().len(), 1);
    let sales_order = h.store.get_sales_order(&name).await.unwrap().unwrap();
    assert_eq!(sales_order.woocommerce_status.as_deref(), Some("Shipped"));

    let settled = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(settled.report.writes(), 0);
    assert_eq!(h.shop.writes().len(), 1);
}

#[tokio::test]
async fn unmapped_status_is_reported() {
    let h = harness(|server| {
        server.enable_so_status_sync = true;
        server.so_status_map = shipped_when_completed();
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    let name = synced_order_name(&h).await;

    let outcome = h.orchestrator.push_order_status(&name).await.unwrap();
    assert_eq!(
        outcome,
        PushOutcome::Unmapped {
            local_status: "Draft".to_string()
        }
    );
    assert!(h.shop.writes().is_empty());
}

#[tokio::test]
async fn status_sync_off_is_disabled() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    let name = synced_order_name(&h).await;

    let outcome = h.orchestrator.push_order_status(&name).await.unwrap();
    assert_eq!(outcome, PushOutcome::Disabled);
}

#[tokio::test]
async fn unknown_sales_order_is_not_found() {
    let h = harness(|_| {}).await;
    let err = h
        .orchestrator
        .push_order_status(&RecordName::new("SO-missing".into()).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}
