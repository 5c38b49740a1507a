//! Shared helpers for WooCommerce API integration tests

use serde_json::{json, Value};
use wiremock::MockServer;

use woosync_api::client::WooClient;
use woosync_api::WooCommerceProvider;
use woosync_core::domain::ServerId;

/// Consumer key used by every test client
pub const CONSUMER_KEY: &str = "ck_test";

/// Consumer secret used by every test client
pub const CONSUMER_SECRET: &str = "cs_test";

/// Starts a mock server and returns a provider pointed at it
pub async fn setup_provider() -> (MockServer, WooCommerceProvider) {
    let server = MockServer::start().await;
    let provider = provider_for(&server);
    (server, provider)
}

/// A provider for an already running mock server
pub fn provider_for(server: &MockServer) -> WooCommerceProvider {
    let client = WooClient::with_base_url(CONSUMER_KEY, CONSUMER_SECRET, server.uri());
    let id = ServerId::from_url(&server.uri()).expect("mock server URI has a host");
    WooCommerceProvider::new(client, id)
}

/// A minimal product body as returned by `GET /products`
pub fn product(id: u64, sku: &str, modified: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "type": "simple",
        "status": "publish",
        "sku": sku,
        "date_modified": modified,
        "date_modified_gmt": modified,
    })
}

/// A minimal order body as returned by `GET /orders`
pub fn order(id: u64, status: &str, modified: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "currency": "EUR",
        "total": "42.00",
        "date_created_gmt": "2024-01-10T08:00:00",
        "date_modified_gmt": modified,
        "billing": { "email": "buyer@example.com" },
        "line_items": [],
    })
}

/// `n` products with consecutive ids starting at `first`
pub fn products(first: u64, n: u64) -> Vec<Value> {
    (first..first + n)
        .map(|id| product(id, &format!("SKU-{id}"), "2024-05-01T10:00:00"))
        .collect()
}
