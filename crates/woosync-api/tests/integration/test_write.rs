//! Partial updates and record creation

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use woosync_core::domain::{RemoteEntity, RemoteId};
use woosync_core::ports::{IRemoteApi, RemoteApiError};

use crate::common;

#[tokio::test]
async fn test_update_puts_partial_body() {
    let (server, provider) = common::setup_provider().await;

    let fields = json!({ "status": "completed" });
    Mock::given(method("PUT"))
        .and(path("/orders/55"))
        .and(body_json(&fields))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::order(
            55,
            "completed",
            "2024-06-01T09:00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let record = provider
        .update(&RemoteEntity::Order, &RemoteId::from_u64(55).unwrap(), fields)
        .await
        .unwrap();

    assert_eq!(record.status(), Some("completed"));
    assert_eq!(record.modified(), "2024-06-01T09:00:00Z".parse::<chrono::DateTime<chrono::Utc>>().unwrap());
}

#[tokio::test]
async fn test_create_posts_to_collection() {
    let (server, provider) = common::setup_provider().await;

    let fields = json!({
        "name": "Canvas Tote",
        "type": "simple",
        "sku": "TOTE-01",
        "regular_price": "19.90",
    });
    Mock::given(method("POST"))
        .and(path("/products"))
        .and(body_json(&fields))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::product(
            501,
            "TOTE-01",
            "2024-06-01T09:00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let record = provider
        .create(&RemoteEntity::Product, fields)
        .await
        .unwrap();

    assert_eq!(record.id().as_str(), "501");
    assert_eq!(record.str_field("sku"), Some("TOTE-01"));
}

#[tokio::test]
async fn test_create_variation_below_parent() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("POST"))
        .and(path("/products/7/variations"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::product(
            78,
            "TEE-XL",
            "2024-06-01T09:00:00",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let entity = RemoteEntity::Variation {
        parent: RemoteId::from_u64(7).unwrap(),
    };
    let record = provider
        .create(&entity, json!({ "sku": "TEE-XL" }))
        .await
        .unwrap();
    assert_eq!(record.id().as_str(), "78");
}

#[tokio::test]
async fn test_rejected_update_reports_server_message() {
    let (server, provider) = common::setup_provider().await;

    Mock::given(method("PUT"))
        .and(path("/orders/55"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "code": "rest_invalid_param",
            "message": "Invalid parameter(s): status",
            "data": { "status": 400 }
        })))
        .mount(&server)
        .await;

    let err = provider
        .update(
            &RemoteEntity::Order,
            &RemoteId::from_u64(55).unwrap(),
            json!({ "status": "shipped" }),
        )
        .await
        .unwrap_err();

    match err {
        RemoteApiError::Server { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("Invalid parameter(s): status"));
        }
        other => panic!("expected Server error, got {other:?}"),
    }
}
