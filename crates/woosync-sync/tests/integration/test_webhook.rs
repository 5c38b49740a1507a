use woosync_core::domain::{RemoteEntity, RemoteId};
use woosync_core::ports::ILocalStore;
use woosync_sync::webhook::sign;
use woosync_sync::{RecordOutcome, WebhookError, WebhookHandler, WebhookOutcome};

use crate::common::{self, harness, order, simple_product, SHOP_URL, WEBHOOK_SECRET};

fn body(id: u64) -> Vec<u8> {
    serde_json::to_vec(&order(id, 7)).unwrap()
}

#[tokio::test]
async fn signed_delivery_creates_sales_order() {
    let h = harness(|_| {}).await;
    h.shop.insert(&RemoteEntity::Product, simple_product(7, "Mug"));
    let handler = WebhookHandler::new(h.orchestrator.clone());

    let payload = body(2001);
    let signature = sign(WEBHOOK_SECRET, &payload);
    let outcome = handler
        .order_created(Some(SHOP_URL), Some(&signature), &payload)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Synced(RecordOutcome::CreatedLocal));

    assert!(h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(2001).unwrap())
        .await
        .unwrap()
        .is_some());

    // Redelivery of the same order changes nothing
    let again = handler
        .order_created(Some(SHOP_URL), Some(&signature), &payload)
        .await
        .unwrap();
    assert_eq!(again, WebhookOutcome::Synced(RecordOutcome::Skipped));
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let h = harness(|_| {}).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = body(2001);

    let err = handler
        .order_created(Some(SHOP_URL), Some("bm90IGEgc2lnbmF0dXJl"), &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature));
    assert_eq!(err.status_code(), 401);

    let err = handler
        .order_created(Some(SHOP_URL), None, &payload)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn server_without_secret_refuses_deliveries() {
    let h = harness(|server| server.secret = None).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = body(2001);

    let err = handler
        .order_created(Some(SHOP_URL), Some(&sign("", &payload)), &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::MissingSecret(_)));
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let h = harness(|_| {}).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = body(2001);

    let err = handler
        .order_created(
            Some("https://other.example.org"),
            Some(&sign(WEBHOOK_SECRET, &payload)),
            &payload,
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn ping_is_acknowledged() {
    let h = harness(|_| {}).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = b"webhook_id=17".to_vec();

    let outcome = handler
        .order_created(Some(SHOP_URL), Some(&sign(WEBHOOK_SECRET, &payload)), &payload)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ping);
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let h = harness(|_| {}).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = br#"{"status": "processing"}"#.to_vec();

    let err = handler
        .order_created(Some(SHOP_URL), Some(&sign(WEBHOOK_SECRET, &payload)), &payload)
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::Malformed(_)));
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn disabled_server_acknowledges_without_syncing() {
    let h = harness(|server| server.enable_sync = false).await;
    let handler = WebhookHandler::new(h.orchestrator.clone());
    let payload = body(2001);

    let outcome = handler
        .order_created(Some(SHOP_URL), Some(&sign(WEBHOOK_SECRET, &payload)), &payload)
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Disabled);
    assert!(h
        .store
        .find_sales_order_by_remote(&common::server(), &RemoteId::from_u64(2001).unwrap())
        .await
        .unwrap()
        .is_none());
}
