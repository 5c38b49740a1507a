//! Shared fixtures: an in-memory WooCommerce shop and a wired orchestrator

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{json, Value};

use woosync_core::config::{ConfigBuilder, ServerConfig};
use woosync_core::domain::{RemoteEntity, RemoteId, RemoteRecord, ServerId};
use woosync_core::ports::{ILocalStore, IRemoteApi, ISyncStateRepository, RemoteApiError};
use woosync_store::{DatabasePool, SqliteStore};
use woosync_sync::SyncOrchestrator;

pub const SHOP_URL: &str = "https://shop.example.com";
pub const WEBHOOK_SECRET: &str = "hook-secret";
pub const WAREHOUSE: &str = "Stores - WS";

pub fn server() -> ServerId {
    ServerId::from_url(SHOP_URL).unwrap()
}

pub fn initial_checkpoint() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

// ============================================================================
// FakeShop
// ============================================================================

/// WooCommerce stand-in keeping records in memory
///
/// Writes stamp `date_modified_gmt` with the current time, like the real
/// REST API does.
pub struct FakeShop {
    server: ServerId,
    records: Mutex<BTreeMap<(String, u64), Value>>,
    next_id: AtomicU64,
    failing_lists: AtomicU32,
    list_delay_ms: AtomicU64,
    writes: Mutex<Vec<(String, Value)>>,
}

impl FakeShop {
    pub fn new() -> Self {
        Self {
            server: server(),
            records: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(5000),
            failing_lists: AtomicU32::new(0),
            list_delay_ms: AtomicU64::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, entity: &RemoteEntity, body: Value) {
        let id = body["id"].as_u64().unwrap();
        self.records
            .lock()
            .unwrap()
            .insert((entity.endpoint(), id), body);
    }

    pub fn get(&self, entity: &RemoteEntity, id: u64) -> Option<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&(entity.endpoint(), id))
            .cloned()
    }

    /// The next `n` listings answer 503
    pub fn fail_next_lists(&self, n: u32) {
        self.failing_lists.store(n, Ordering::SeqCst);
    }

    /// Every listing takes `ms` milliseconds to answer
    pub fn delay_lists(&self, ms: u64) {
        self.list_delay_ms.store(ms, Ordering::SeqCst);
    }

    /// Endpoint and body of every create and update, in order
    pub fn writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().unwrap().clone()
    }

    fn now() -> Value {
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    fn record(entity: &RemoteEntity, body: Value) -> Result<RemoteRecord, RemoteApiError> {
        RemoteRecord::from_json(entity.clone(), body).map_err(|e| RemoteApiError::Decode(e.to_string()))
    }

    fn key(entity: &RemoteEntity, id: &RemoteId) -> (String, u64) {
        (entity.endpoint(), id.as_str().parse().unwrap())
    }
}

#[async_trait::async_trait]
impl IRemoteApi for FakeShop {
    fn server(&self) -> &ServerId {
        &self.server
    }

    async fn fetch_modified_since(
        &self,
        entity: &RemoteEntity,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteRecord>, RemoteApiError> {
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        let failing = self.failing_lists.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_lists.store(failing - 1, Ordering::SeqCst);
            return Err(RemoteApiError::Server {
                status: 503,
                message: "maintenance".into(),
            });
        }

        let endpoint = entity.endpoint();
        let bodies: Vec<Value> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|((e, _), _)| *e == endpoint)
            .map(|(_, body)| body.clone())
            .collect();

        let mut records = Vec::new();
        for body in bodies {
            let record = Self::record(entity, body)?;
            if record.modified() >= since {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn fetch_by_id(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let body = self
            .records
            .lock()
            .unwrap()
            .get(&Self::key(entity, id))
            .cloned()
            .ok_or_else(|| RemoteApiError::NotFound(format!("{} {id}", entity.endpoint())))?;
        Self::record(entity, body)
    }

    async fn update(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let body = {
            let mut records = self.records.lock().unwrap();
            let body = records
                .get_mut(&Self::key(entity, id))
                .ok_or_else(|| RemoteApiError::NotFound(format!("{} {id}", entity.endpoint())))?;
            if let (Some(target), Some(patch)) = (body.as_object_mut(), fields.as_object()) {
                for (key, value) in patch {
                    target.insert(key.clone(), value.clone());
                }
            }
            body["date_modified_gmt"] = Self::now();
            body.clone()
        };
        self.writes
            .lock()
            .unwrap()
            .push((format!("{}/{id}", entity.endpoint()), fields));
        Self::record(entity, body)
    }

    async fn create(
        &self,
        entity: &RemoteEntity,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut body = fields.clone();
        body["id"] = json!(id);
        body["date_modified_gmt"] = Self::now();
        self.insert(entity, body.clone());
        self.writes.lock().unwrap().push((entity.endpoint(), fields));
        Self::record(entity, body)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub shop: Arc<FakeShop>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

/// A synced server with defaults; `configure` adjusts the server record
pub async fn harness(configure: impl FnOnce(&mut ServerConfig)) -> Harness {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let store = Arc::new(SqliteStore::new(pool.pool().clone()));
    let shop = Arc::new(FakeShop::new());

    let mut server = ServerConfig::new(SHOP_URL, "ck_test", "cs_test");
    server.enable_sync = true;
    server.secret = Some(WEBHOOK_SECRET.to_string());
    server.company = Some("Acme".to_string());
    server.warehouse = Some(WAREHOUSE.to_string());
    server.warehouses = vec![WAREHOUSE.to_string()];
    configure(&mut server);

    let config = ConfigBuilder::new()
        .server(server)
        .initial_checkpoint(initial_checkpoint())
        .retry_max_retries(2)
        .retry_base_delay_ms(0)
        .build();

    let orchestrator = SyncOrchestrator::new(
        config,
        Arc::clone(&store) as Arc<dyn ILocalStore>,
        Arc::clone(&store) as Arc<dyn ISyncStateRepository>,
        vec![Arc::clone(&shop) as Arc<dyn IRemoteApi>],
    )
    .with_lock_heartbeat(std::time::Duration::from_millis(50));

    Harness {
        store,
        shop,
        orchestrator: Arc::new(orchestrator),
    }
}

// ============================================================================
// Payloads
// ============================================================================

pub fn simple_product(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "type": "simple",
        "status": "publish",
        "sku": format!("SKU-{id}"),
        "description": format!("{name} description"),
        "date_modified_gmt": "2024-04-01T08:00:00",
    })
}

pub fn billing() -> Value {
    json!({
        "first_name": "Jane",
        "last_name": "Doe",
        "company": "",
        "address_1": "1 Rue de la Paix",
        "address_2": "",
        "city": "Paris",
        "state": "",
        "postcode": "75002",
        "country": "FR",
        "email": "jane@example.com",
        "phone": "+33 1 23 45 67 89",
    })
}

/// A processing order for two units of product `product_id` at 19.00
pub fn order(id: u64, product_id: u64) -> Value {
    json!({
        "id": id,
        "status": "processing",
        "currency": "EUR",
        "customer_id": 12,
        "customer_note": "Leave at the door",
        "date_created_gmt": "2024-05-01T09:00:00",
        "date_modified_gmt": "2024-05-01T10:00:00",
        "payment_method": "cod",
        "payment_method_title": "Cash on delivery",
        "discount_total": "0.00",
        "shipping_total": "4.50",
        "total": "42.50",
        "billing": billing(),
        "shipping": billing(),
        "line_items": [
            {"id": 1, "name": "Mug", "product_id": product_id, "variation_id": 0, "quantity": 2, "price": 19}
        ],
        "shipping_lines": [],
        "fee_lines": [],
    })
}
