use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use woosync_core::config::ServerConfig;
use woosync_core::domain::{
    CustomerIdentifier, DocStatus, ErrorKind, ItemCode, RemoteEntity, RemoteId, SalesOrder, SyncScope,
};
use woosync_core::ports::{ILocalStore, ISyncStateRepository};
use woosync_sync::{RecordOutcome, SyncError};

use crate::common::{self, harness, order, simple_product, Harness};

#[tokio::test]
async fn new_order_creates_sales_order_with_customer_and_items() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));

    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);
    assert_eq!(outcome.report.failed, 0);

    let sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .expect("sales order created");
    assert_eq!(sales_order.po_no.as_deref(), Some("1042"));
    assert_eq!(sales_order.woocommerce_status.as_deref(), Some("Processing"));
    assert_eq!(sales_order.docstatus, DocStatus::Draft);
    assert_eq!(sales_order.currency, "EUR");
    assert_eq!(sales_order.company.as_deref(), Some("Acme"));
    assert_eq!(sales_order.customer_note.as_deref(), Some("Leave at the door"));
    assert_eq!(sales_order.payment_method.as_deref(), Some("Cash on delivery"));
    assert_eq!(sales_order.items.len(), 1);
    assert_eq!(sales_order.items[0].item_code.as_str(), "7");
    assert_eq!(sales_order.items[0].qty, dec!(2));
    assert_eq!(sales_order.items[0].rate, dec!(19));
    assert_eq!(sales_order.items[0].warehouse.as_deref(), Some(common::WAREHOUSE));
    assert_eq!(sales_order.grand_total, dec!(42.50));

    let item = h
        .store
        .get_item(&ItemCode::new("7".into()).unwrap())
        .await
        .unwrap()
        .expect("item created from the line's product");
    assert_eq!(item.item_name, "Mug");

    let customer = h
        .store
        .find_customer_by_identifier(&CustomerIdentifier::new("jane@example.com".into()).unwrap())
        .await
        .unwrap()
        .expect("customer created");
    assert_eq!(customer.customer_name, "Jane Doe");
    assert_eq!(sales_order.customer, customer.name);

    let addresses = h.store.get_addresses(&customer.name).await.unwrap();
    assert_eq!(addresses.len(), 1);
    assert!(addresses[0].is_primary_address);
    assert!(addresses[0].is_shipping_address);
    assert_eq!(addresses[0].pincode.as_deref(), Some("75002"));

    let contacts = h.store.get_contacts(&customer.name).await.unwrap();
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].email.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn second_pass_writes_nothing() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));

    let first = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(first.report.writes(), 1);

    let second = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(second.report.writes(), 0);
    assert_eq!(second.report.failed, 0);
    assert!(second.checkpoint >= first.checkpoint);
    assert!(h.shop.writes().is_empty());
}

#[tokio::test]
async fn separate_shipping_address_splits_addresses() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = order(1042, 7);
    body["shipping"] = json!({
        "first_name": "Jane",
        "last_name": "Doe",
        "address_1": "9 Quai Voltaire",
        "city": "Paris",
        "postcode": "75007",
        "country": "FR",
    });
    h.shop.insert(&RemoteEntity::Order, body);

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let customer = h
        .store
        .find_customer_by_identifier(&CustomerIdentifier::new("jane@example.com".into()).unwrap())
        .await
        .unwrap()
        .unwrap();
    let addresses = h.store.get_addresses(&customer.name).await.unwrap();
    assert_eq!(addresses.len(), 2);

    let billing = addresses.iter().find(|a| a.is_primary_address).unwrap();
    let shipping = addresses.iter().find(|a| a.is_shipping_address).unwrap();
    assert_ne!(billing.name, shipping.name);
    assert_eq!(shipping.pincode.as_deref(), Some("75007"));
    // Shipping payloads carry no email; the billing one is used
    assert_eq!(shipping.email.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn deleted_product_lines_use_placeholder_item() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Order, order(1042, 0));

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap();
    let placeholder = h
        .store
        .get_item(&sales_order.items[0].item_code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.item_name, woosync_sync::items::DELETED_PRODUCT_ITEM_NAME);
    assert!(!placeholder.is_stock_item);
}

#[tokio::test]
async fn remote_status_change_updates_sales_order() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let mut body = order(1042, 7);
    body["status"] = json!("on-hold");
    body["date_modified_gmt"] = json!(chrono::Utc::now().to_rfc3339());
    h.shop.insert(&RemoteEntity::Order, body);

    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.updated_local, 1);

    let sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sales_order.woocommerce_status.as_deref(), Some("On hold"));
}

#[tokio::test]
async fn cancelled_sales_order_is_left_alone() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let mut sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap();
    sales_order.docstatus = DocStatus::Cancelled;
    sales_order.status = "Cancelled".to_string();
    h.store.save_sales_order(&sales_order).await.unwrap();

    let outcome = h.orchestrator.sync_single_order(&sales_order.name).await.unwrap();
    assert_eq!(outcome, RecordOutcome::Skipped);
    assert!(h.shop.writes().is_empty());
}

#[tokio::test]
async fn missing_remote_order_is_reported() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let err = h
        .orchestrator
        .sync_single_remote_order(&common::server(), &RemoteId::from_u64(999).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RemoteOrderNotFound { .. }));
}

#[tokio::test]
async fn submit_setting_submits_sales_orders() {
    let h = harness(|server| server.submit_sales_orders = true).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, order(1042, 7));

    h.orchestrator
        .sync_single_remote_order(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap();

    let sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sales_order.docstatus, DocStatus::Submitted);
    assert_eq!(sales_order.status, "To Deliver and Bill");
}

#[tokio::test]
async fn order_for_unlinked_item_reenables_its_link() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let code = ItemCode::new("7".into()).unwrap();
    let mut item = h.store.get_item(&code).await.unwrap().unwrap();
    item.links.for_server_mut(&common::server()).unwrap().enabled = false;
    h.store.save_item_links(&item.item_code, &item.links).await.unwrap();

    h.shop.insert(&RemoteEntity::Order, order(1042, 7));
    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);
    assert_eq!(outcome.report.failed, 0);

    let item = h.store.get_item(&code).await.unwrap().unwrap();
    let link = item.links.for_server(&common::server()).unwrap();
    assert!(link.enabled);
    assert_eq!(link.remote_id, Some(RemoteId::from_u64(7).unwrap()));

    let sales_order = h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(1042).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sales_order.items[0].item_code, code);
}

#[tokio::test]
async fn gst_tin_meta_sets_customer_gst_id() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = order(1042, 7);
    body["meta_data"] = json!([{"id": 90, "key": "gst-tin", "value": " 27AAPFU0939F1ZV "}]);
    h.shop.insert(&RemoteEntity::Order, body);

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let customer = h
        .store
        .find_customer_by_identifier(&CustomerIdentifier::new("jane@example.com".into()).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.gst_id.as_deref(), Some("27AAPFU0939F1ZV"));
}

// ============================================================================
// Payment entries
// ============================================================================

fn with_payments(server: &mut ServerConfig) {
    server.submit_sales_orders = true;
    server.enable_payments_sync = true;
    server.payment_method_bank_account_mapping = BTreeMap::from([
        ("stripe".to_string(), "Acme Bank".to_string()),
        ("cod".to_string(), String::new()),
    ]);
    server.payment_method_gl_account_mapping =
        BTreeMap::from([("stripe".to_string(), "Stripe Clearing - AC".to_string())]);
}

fn paid_order(id: u64, product_id: u64) -> Value {
    let mut body = order(id, product_id);
    body["payment_method"] = json!("stripe");
    body["payment_method_title"] = json!("Credit card");
    body["transaction_id"] = json!("ch_3PkQ");
    body["date_paid_gmt"] = json!("2024-05-02T09:30:00");
    body
}

async fn synced_order(h: &Harness, id: u64) -> SalesOrder {
    h.store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(id).unwrap())
        .await
        .unwrap()
        .expect("sales order synced")
}

#[tokio::test]
async fn paid_order_books_one_payment_entry() {
    let h = harness(with_payments).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, paid_order(1042, 7));

    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);
    assert_eq!(outcome.report.failed, 0);

    let sales_order = synced_order(&h, 1042).await;
    assert!(sales_order.payment_entry_attempted);
    let name = sales_order.payment_entry.clone().expect("payment entry linked");
    let entry = h.store.get_payment_entry(&name).await.unwrap().unwrap();
    assert_eq!(entry.sales_order, sales_order.name);
    assert_eq!(entry.party, sales_order.customer);
    assert_eq!(entry.company.as_deref(), Some("Acme"));
    assert_eq!(entry.reference_no, "ch_3PkQ");
    assert_eq!(entry.posting_date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
    assert_eq!(entry.reference_date, entry.posting_date);
    assert_eq!(entry.paid_amount, dec!(42.50));
    assert_eq!(entry.received_amount, dec!(42.50));
    assert_eq!(entry.allocated_amount, sales_order.grand_total);
    assert_eq!(entry.bank_account, "Acme Bank");
    assert_eq!(entry.paid_to, "Stripe Clearing - AC");

    let second = h.orchestrator.sync_single_order(&sales_order.name).await.unwrap();
    assert_eq!(second, RecordOutcome::Skipped);
    let entries = h.store.payment_entries_for_order(&sales_order.name).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn unpaid_order_is_booked_once_paid() {
    let h = harness(with_payments).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = paid_order(1042, 7);
    body["date_paid_gmt"] = Value::Null;
    body["transaction_id"] = json!("");
    h.shop.insert(&RemoteEntity::Order, body.clone());

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    let sales_order = synced_order(&h, 1042).await;
    assert!(sales_order.payment_entry.is_none());
    assert!(!sales_order.payment_entry_attempted);

    body["date_paid_gmt"] = json!("2024-05-03T08:00:00");
    body["meta_data"] = json!([{"id": 4, "key": "yoco_order_payment_id", "value": "yoco_77"}]);
    body["date_modified_gmt"] = json!(Utc::now().to_rfc3339());
    h.shop.insert(&RemoteEntity::Order, body);

    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.updated_local, 1);

    let sales_order = synced_order(&h, 1042).await;
    let entry = h
        .store
        .get_payment_entry(sales_order.payment_entry.as_ref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.reference_no, "yoco_77");
    assert_eq!(entry.posting_date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
}

#[tokio::test]
async fn ignoring_paid_date_books_on_order_date() {
    let h = harness(|server| {
        with_payments(server);
        server.ignore_date_paid = true;
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = paid_order(1042, 7);
    body["date_paid_gmt"] = Value::Null;
    body["transaction_id"] = Value::Null;
    h.shop.insert(&RemoteEntity::Order, body);

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let sales_order = synced_order(&h, 1042).await;
    let entry = h
        .store
        .get_payment_entry(sales_order.payment_entry.as_ref().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.reference_no, "Credit card");
    assert_eq!(entry.posting_date, sales_order.transaction_date);
}

#[tokio::test]
async fn method_without_bank_account_only_marks_the_attempt() {
    let h = harness(with_payments).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = order(1042, 7);
    body["date_paid_gmt"] = json!("2024-05-02T09:30:00");
    h.shop.insert(&RemoteEntity::Order, body);

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();

    let sales_order = synced_order(&h, 1042).await;
    assert!(sales_order.payment_entry.is_none());
    assert!(sales_order.payment_entry_attempted);
    assert!(h
        .store
        .payment_entries_for_order(&sales_order.name)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unmapped_payment_method_is_logged_and_left_open() {
    let h = harness(with_payments).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let mut body = paid_order(1042, 7);
    body["payment_method"] = json!("paypal");
    h.shop.insert(&RemoteEntity::Order, body);

    let outcome = h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);

    let sales_order = synced_order(&h, 1042).await;
    assert!(sales_order.payment_entry.is_none());
    assert!(!sales_order.payment_entry_attempted);

    let logs = h
        .store
        .get_error_logs_since(Utc::now() - Duration::minutes(5), 10)
        .await
        .unwrap();
    assert!(logs
        .iter()
        .any(|entry| entry.kind() == ErrorKind::Validation && entry.details()["payment_method"] == "paypal"));
}

#[tokio::test]
async fn draft_order_is_booked_after_submission() {
    let h = harness(|server| {
        with_payments(server);
        server.submit_sales_orders = false;
    })
    .await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.shop.insert(&RemoteEntity::Order, paid_order(1042, 7));

    h.orchestrator.run_scope(SyncScope::SalesOrders).await.unwrap();
    let mut sales_order = synced_order(&h, 1042).await;
    assert_eq!(sales_order.docstatus, DocStatus::Draft);
    assert!(sales_order.payment_entry.is_none());

    sales_order.docstatus = DocStatus::Submitted;
    h.store.save_sales_order(&sales_order).await.unwrap();

    let outcome = h.orchestrator.sync_single_order(&sales_order.name).await.unwrap();
    assert_eq!(outcome, RecordOutcome::UpdatedLocal);

    let sales_order = synced_order(&h, 1042).await;
    assert!(sales_order.payment_entry.is_some());
    assert!(h.shop.writes().is_empty());
}
