use serde_json::json;

use woosync_core::domain::{Item, ItemCode, ItemKind, RemoteEntity, RemoteId, SyncLink, SyncScope};
use woosync_core::ports::ILocalStore;

use crate::common::{self, harness, simple_product};

fn code(s: &str) -> ItemCode {
    ItemCode::new(s.to_string()).unwrap()
}

fn variable_product() -> serde_json::Value {
    json!({
        "id": 10,
        "name": "T-Shirt",
        "type": "variable",
        "description": "Organic cotton",
        "attributes": [
            {"name": "Colour", "options": ["Red", "Blue"], "variation": true}
        ],
        "date_modified_gmt": "2024-04-01T08:00:00",
    })
}

fn variation(id: u64, colour: &str) -> serde_json::Value {
    json!({
        "id": id,
        "attributes": [{"name": "Colour", "option": colour}],
        "date_modified_gmt": "2024-04-01T08:00:00",
    })
}

#[tokio::test]
async fn products_are_created_locally() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.created_local, 1);

    let item = h.store.get_item(&code("7")).await.unwrap().unwrap();
    assert_eq!(item.item_name, "Mug");
    assert_eq!(item.description.as_deref(), Some("Mug description"));
    let link = item.links.for_server(&common::server()).unwrap();
    assert_eq!(link.remote_id, Some(RemoteId::from_u64(7).unwrap()));
    assert!(link.enabled);

    let again = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(again.report.writes(), 0);
    assert!(h.shop.writes().is_empty());
}

#[tokio::test]
async fn variable_products_become_templates_with_variants() {
    let h = harness(|_| {}).await;
    let parent = RemoteEntity::Variation {
        parent: RemoteId::from_u64(10).unwrap(),
    };
    h.shop.insert(&RemoteEntity::Product, variable_product());
    h.shop.insert(&parent, variation(11, "Red"));
    h.shop.insert(&parent, variation(12, "Blue"));

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.created_local, 3);
    assert_eq!(outcome.report.failed, 0);

    let template = h.store.get_item(&code("10")).await.unwrap().unwrap();
    assert_eq!(template.kind, ItemKind::Template);

    let red = h.store.get_item(&code("11")).await.unwrap().unwrap();
    assert_eq!(red.kind.variant_of(), Some(&code("10")));
    assert_eq!(red.attribute_value("Colour"), Some("Red"));

    let colour = h.store.get_item_attribute("Colour").await.unwrap().unwrap();
    assert!(colour.values.iter().any(|v| v == "Blue"));
}

#[tokio::test]
async fn local_edit_is_pushed_to_product() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let mut item = h.store.get_item(&code("7")).await.unwrap().unwrap();
    item.item_name = "Large Mug".to_string();
    h.store.save_item(&item).await.unwrap();

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.updated_remote, 1);

    let product = h.shop.get(&RemoteEntity::Product, 7).unwrap();
    assert_eq!(product["name"], "Large Mug");

    let settled = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(settled.report.writes(), 0);
}

#[tokio::test]
async fn pending_link_creates_product() {
    let h = harness(|_| {}).await;
    let mut item = Item::new(code("CUP"), "Espresso Cup", "Products", "Nos");
    item.links.upsert(SyncLink::pending(common::server()));
    h.store.save_item(&item).await.unwrap();

    let report = h.orchestrator.sync_single_item(&code("CUP")).await.unwrap();
    assert_eq!(report.created_remote, 1);

    let item = h.store.get_item(&code("CUP")).await.unwrap().unwrap();
    let remote_id = item
        .links
        .for_server(&common::server())
        .and_then(|link| link.remote_id.clone())
        .expect("remote id recorded");
    let product = h
        .shop
        .get(&RemoteEntity::Product, remote_id.as_str().parse().unwrap())
        .unwrap();
    assert_eq!(product["name"], "Espresso Cup");
    assert_eq!(product["type"], "simple");
}

#[tokio::test]
async fn unlinked_item_is_not_synced() {
    let h = harness(|_| {}).await;
    let item = Item::new(code("LOCAL"), "Local only", "Products", "Nos");
    h.store.save_item(&item).await.unwrap();

    let err = h.orchestrator.sync_single_item(&code("LOCAL")).await.unwrap_err();
    assert!(matches!(err, woosync_sync::SyncError::NotLinked(_)));
}

#[tokio::test]
async fn disabled_link_is_reenabled_when_remote_changes() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let mut item = h.store.get_item(&code("7")).await.unwrap().unwrap();
    item.links.for_server_mut(&common::server()).unwrap().enabled = false;
    h.store.save_item_links(&item.item_code, &item.links).await.unwrap();

    let report = h.orchestrator.sync_single_item(&code("7")).await.unwrap();
    assert_eq!(report.writes(), 0);
    assert_eq!(report.skipped, 1);

    let mut body = simple_product(7, "Mug v2");
    body["date_modified_gmt"] = json!(chrono::Utc::now().to_rfc3339());
    h.shop.insert(&RemoteEntity::Product, body);

    let outcome = h.orchestrator.run_scope(SyncScope::Items).await.unwrap();
    assert_eq!(outcome.report.updated_local, 1);
    let item = h.store.get_item(&code("7")).await.unwrap().unwrap();
    assert_eq!(item.item_name, "Mug v2");
    assert!(item.links.for_server(&common::server()).unwrap().enabled);
}

#[tokio::test]
async fn single_item_sync_reports_outcome() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    h.orchestrator.run_scope(SyncScope::Items).await.unwrap();

    let report = h.orchestrator.sync_single_item(&code("7")).await.unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.skipped, 1);
}
