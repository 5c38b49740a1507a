//! WooCommerceProvider - IRemoteApi implementation for the WooCommerce REST API
//!
//! Wraps a [`WooClient`] and translates port calls into `wc/v3` requests.
//!
//! ## Design Notes
//!
//! - `modified_after` is exclusive on the server side, so listings ask for
//!   one second earlier than requested. Re-processing a record is harmless;
//!   missing one is not.
//! - The default order listing (`status=any`) omits trashed orders; they
//!   are fetched with a second query and merged by id.
//! - Listed records that cannot be decoded (no id or no modification date)
//!   are skipped with a warning instead of failing the whole listing.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use woosync_core::config::{Config, IntegrationConfig, ServerConfig};
use woosync_core::domain::{RemoteEntity, RemoteId, RemoteRecord, ServerId};
use woosync_core::ports::{IRemoteApi, RemoteApiError};

use crate::client::WooClient;
use crate::pagination;
use crate::ApiError;

/// Date format of WooCommerce query parameters (GMT with `dates_are_gmt`)
const QUERY_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn query_date(instant: DateTime<Utc>) -> String {
    instant.format(QUERY_DATE_FORMAT).to_string()
}

/// Remote API implementation for one WooCommerce server
pub struct WooCommerceProvider {
    client: WooClient,
    server: ServerId,
    minimum_creation_date: Option<DateTime<Utc>>,
}

impl WooCommerceProvider {
    /// Creates a provider over an existing client
    pub fn new(client: WooClient, server: ServerId) -> Self {
        Self {
            client,
            server,
            minimum_creation_date: None,
        }
    }

    /// Builds the client and provider for a configured server
    ///
    /// # Errors
    /// `InvalidUrl` when the server URL cannot be used.
    pub fn from_config(
        server: &ServerConfig,
        integration: &IntegrationConfig,
    ) -> Result<Self, ApiError> {
        let id = server
            .server_id()
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let provider = Self::new(WooClient::new(server)?, id);
        Ok(match integration.minimum_creation_date {
            Some(minimum) => provider.with_minimum_creation_date(minimum),
            None => provider,
        })
    }

    /// Only list orders created after `minimum`
    pub fn with_minimum_creation_date(mut self, minimum: DateTime<Utc>) -> Self {
        self.minimum_creation_date = Some(minimum);
        self
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &WooClient {
        &self.client
    }

    fn decode(entity: &RemoteEntity, body: Value) -> Result<RemoteRecord, ApiError> {
        RemoteRecord::from_json(entity.clone(), body)
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", entity, e)))
    }

    fn decode_listing(&self, entity: &RemoteEntity, bodies: Vec<Value>) -> Vec<RemoteRecord> {
        bodies
            .into_iter()
            .filter_map(|body| match Self::decode(entity, body) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(server = %self.server, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect()
    }

    fn listing_filters(&self, entity: &RemoteEntity, since: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut filters = vec![
            ("modified_after", query_date(since - Duration::seconds(1))),
            ("dates_are_gmt", "true".to_string()),
            ("orderby", "id".to_string()),
            ("order", "asc".to_string()),
        ];
        if matches!(entity, RemoteEntity::Order) {
            if let Some(minimum) = self.minimum_creation_date {
                filters.push(("after", query_date(minimum)));
            }
        }
        filters
    }

    async fn list(
        &self,
        entity: &RemoteEntity,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteRecord>, ApiError> {
        let path = format!("/{}", entity.endpoint());
        let filters = self.listing_filters(entity, since);

        let mut records = self.decode_listing(
            entity,
            pagination::fetch_all(&self.client, &path, &filters).await?,
        );

        if matches!(entity, RemoteEntity::Order) {
            let mut trash_filters = filters.clone();
            trash_filters.push(("status", "trash".to_string()));
            let trashed = self.decode_listing(
                entity,
                pagination::fetch_all(&self.client, &path, &trash_filters).await?,
            );

            let seen: BTreeSet<RemoteId> = records.iter().map(|r| r.id().clone()).collect();
            let added = trashed.len();
            records.extend(trashed.into_iter().filter(|r| !seen.contains(r.id())));
            debug!(server = %self.server, trashed = added, "Merged trashed orders");
        }

        Ok(records)
    }
}

/// One provider per configured server, enabled or not
///
/// Servers whose URL cannot be used are skipped with a warning; the
/// orchestrator then reports them as unknown.
pub fn providers_for(config: &Config) -> Vec<Arc<dyn IRemoteApi>> {
    config
        .servers
        .iter()
        .filter_map(|server| {
            match WooCommerceProvider::from_config(server, &config.integration) {
                Ok(provider) => Some(Arc::new(provider) as Arc<dyn IRemoteApi>),
                Err(e) => {
                    warn!(url = %server.url, error = %e, "Skipping server");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl IRemoteApi for WooCommerceProvider {
    fn server(&self) -> &ServerId {
        &self.server
    }

    async fn fetch_modified_since(
        &self,
        entity: &RemoteEntity,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteRecord>, RemoteApiError> {
        debug!(server = %self.server, %entity, %since, "Listing modified records");
        let records = self.list(entity, since).await?;
        debug!(server = %self.server, %entity, count = records.len(), "Listed modified records");
        Ok(records)
    }

    async fn fetch_by_id(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let path = format!("/{}/{}", entity.endpoint(), id);
        let body = self.client.get_json(&path, &[]).await?;
        Ok(Self::decode(entity, body)?)
    }

    async fn update(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let path = format!("/{}/{}", entity.endpoint(), id);
        let body = self.client.put_json(&path, &fields).await?;
        debug!(server = %self.server, %entity, id = %id, "Updated remote record");
        Ok(Self::decode(entity, body)?)
    }

    async fn create(
        &self,
        entity: &RemoteEntity,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError> {
        let path = format!("/{}", entity.endpoint());
        let body = self.client.post_json(&path, &fields).await?;
        let record = Self::decode(entity, body)?;
        debug!(server = %self.server, %entity, id = %record.id(), "Created remote record");
        Ok(record)
    }
}
