//! Status classification and 429 back-off

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use woosync_api::client::WooClient;
use woosync_api::WooCommerceProvider;
use woosync_core::domain::{RemoteEntity, RemoteId, ServerId};
use woosync_core::ports::{IRemoteApi, RemoteApiError};

use crate::common;

fn order_id() -> RemoteId {
    RemoteId::from_u64(99).unwrap()
}

#[tokio::test]
async fn test_unauthorized_is_classified() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/orders/99"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "woocommerce_rest_cannot_view",
            "message": "Sorry, you cannot view this resource.",
            "data": { "status": 401 }
        })))
        .mount(&server)
        .await;

    let err = provider
        .fetch_by_id(&RemoteEntity::Order, &order_id())
        .await
        .unwrap_err();

    match err {
        RemoteApiError::Unauthorized(message) => {
            assert!(message.contains("cannot view"));
            assert!(message.contains("woocommerce_rest_cannot_view"));
        }
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/orders/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "woocommerce_rest_shop_order_invalid_id",
            "message": "Invalid ID.",
            "data": { "status": 404 }
        })))
        .mount(&server)
        .await;

    let err = provider
        .fetch_by_id(&RemoteEntity::Order, &order_id())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteApiError::NotFound(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = provider
        .fetch_modified_since(&RemoteEntity::Product, chrono::Utc::now())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        RemoteApiError::Server {
            status: 503,
            message: "maintenance".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_non_array_listing_is_a_decode_error() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = provider
        .fetch_modified_since(&RemoteEntity::Product, chrono::Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteApiError::Decode(_)));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/orders/99"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/orders/99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::order(
            99,
            "processing",
            "2024-05-01T10:00:00",
        )))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let record = provider
        .fetch_by_id(&RemoteEntity::Order, &order_id())
        .await
        .unwrap();
    assert_eq!(record.id(), &order_id());
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    let client = WooClient::with_base_url(common::CONSUMER_KEY, common::CONSUMER_SECRET, server.uri())
        .with_max_retries(1);
    let provider = WooCommerceProvider::new(client, ServerId::from_url(&server.uri()).unwrap());

    Mock::given(method("GET"))
        .and(path("/orders/99"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let err = provider
        .fetch_by_id(&RemoteEntity::Order, &order_id())
        .await
        .unwrap_err();

    assert!(matches!(err, RemoteApiError::Server { status: 429, .. }));
    assert!(err.is_transient());
}
